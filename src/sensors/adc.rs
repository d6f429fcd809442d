//! HW-080 soil probe on an ESP32 ADC1 channel

use super::traits::{SensorError, SoilProbe};
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::peripherals::ADC1;
use esp_hal::Blocking;

/// Polls of a oneshot conversion before giving up
const MAX_CONVERSION_POLLS: u32 = 10_000;

pub type SoilAdc = Adc<'static, ADC1<'static>, Blocking>;

pub struct AdcSoilProbe<PIN> {
    adc: SoilAdc,
    pin: AdcPin<PIN, ADC1<'static>>,
}

impl<PIN: AdcChannel> AdcSoilProbe<PIN> {
    pub fn new(adc: SoilAdc, pin: AdcPin<PIN, ADC1<'static>>) -> Self {
        Self { adc, pin }
    }
}

impl<PIN: AdcChannel> SoilProbe for AdcSoilProbe<PIN> {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        // WouldBlock until the conversion completes
        for _ in 0..MAX_CONVERSION_POLLS {
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                return Ok(raw);
            }
        }
        Err(SensorError::Adc)
    }
}

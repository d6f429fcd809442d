//! HW-080 resistive soil moisture remap

use crate::config::soil_defaults;

/// Raw ADC end points of the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoilCalibration {
    /// Reading in dry soil (0 %)
    pub raw_dry: u16,
    /// Reading in water (100 %)
    pub raw_wet: u16,
}

impl Default for SoilCalibration {
    fn default() -> Self {
        Self {
            raw_dry: soil_defaults::RAW_DRY,
            raw_wet: soil_defaults::RAW_WET,
        }
    }
}

impl SoilCalibration {
    /// Linear remap of a raw reading to 0..=100 %
    ///
    /// Integer arithmetic truncating toward zero, then clamped.
    pub fn percent(&self, raw: u16) -> u8 {
        let span = self.raw_wet as i32 - self.raw_dry as i32;
        if span == 0 {
            return 0;
        }

        let mapped = (raw as i32 - self.raw_dry as i32) * 100 / span;
        mapped.clamp(0, 100) as u8
    }
}

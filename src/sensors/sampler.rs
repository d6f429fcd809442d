//! One validated sample per control loop cycle
//!
//! Only valid samples are ever built. A failed read leaves the caller's
//! previous sample untouched.

use super::soil::SoilCalibration;
use super::traits::{ClimateSensor, SensorError, SoilProbe};
use log::{debug, warn};

/// A validated reading of every configured channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    /// Present when a soil probe is fitted
    pub soil_moisture_pct: Option<u8>,
}

/// Why a cycle produced no sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    Climate(SensorError),
    /// Temperature, humidity or the derived Fahrenheit value is NaN
    NotANumber,
    Soil(SensorError),
}

/// Fahrenheit from Celsius, used as a redundant validity check
pub fn fahrenheit(celsius: f32) -> f32 {
    celsius * 1.8 + 32.0
}

/// Soil probe type for nodes without one
pub enum NoSoil {}

impl SoilProbe for NoSoil {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        match *self {}
    }
}

/// Reads the climate sensor and, if fitted, the soil probe
pub struct Sampler<C, S> {
    climate: C,
    soil: Option<S>,
    calibration: SoilCalibration,
}

impl<C: ClimateSensor> Sampler<C, NoSoil> {
    pub fn climate_only(climate: C) -> Self {
        Self {
            climate,
            soil: None,
            calibration: SoilCalibration::default(),
        }
    }
}

impl<C, S> Sampler<C, S>
where
    C: ClimateSensor,
    S: SoilProbe,
{
    pub fn with_soil(climate: C, soil: S, calibration: SoilCalibration) -> Self {
        Self {
            climate,
            soil: Some(soil),
            calibration,
        }
    }

    pub fn has_soil(&self) -> bool {
        self.soil.is_some()
    }

    pub fn climate(&self) -> &C {
        &self.climate
    }

    pub fn soil(&self) -> Option<&S> {
        self.soil.as_ref()
    }

    /// Take one sample
    ///
    /// The soil probe is only read after a valid climate reading.
    pub fn sample(&mut self) -> Result<SensorSample, SampleError> {
        let reading = self.climate.read().map_err(|e| {
            warn!("Climate sensor read failed: {:?}", e);
            SampleError::Climate(e)
        })?;

        let temperature_f = fahrenheit(reading.temperature_c);
        if reading.temperature_c.is_nan()
            || reading.humidity_pct.is_nan()
            || temperature_f.is_nan()
        {
            warn!("Failed to read from DHT sensor!");
            return Err(SampleError::NotANumber);
        }

        let soil_moisture_pct = match self.soil.as_mut() {
            Some(probe) => {
                let raw = probe.read_raw().map_err(|e| {
                    warn!("Soil probe read failed: {:?}", e);
                    SampleError::Soil(e)
                })?;
                let percent = self.calibration.percent(raw);
                debug!("Soil raw {} -> {}%", raw, percent);
                Some(percent)
            }
            None => None,
        };

        Ok(SensorSample {
            temperature_c: reading.temperature_c,
            humidity_pct: reading.humidity_pct,
            soil_moisture_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::traits::mock::{MockClimateSensor, MockSoilProbe};

    #[test]
    fn test_sample_with_soil() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(24.5, 60.0);
        let mut sampler =
            Sampler::with_soil(climate, MockSoilProbe::new(2046), SoilCalibration::default());

        let sample = sampler.sample().expect("Should sample");
        assert_eq!(sample.temperature_c, 24.5);
        assert_eq!(sample.humidity_pct, 60.0);
        assert_eq!(sample.soil_moisture_pct, Some(50));
    }

    #[test]
    fn test_climate_only() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(21.0, 40.0);
        let mut sampler = Sampler::climate_only(climate);

        let sample = sampler.sample().unwrap();
        assert_eq!(sample.soil_moisture_pct, None);
        assert!(!sampler.has_soil());
    }

    #[test]
    fn test_nan_channels_fail() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(f32::NAN, 60.0);
        climate.queue_reading(24.5, f32::NAN);
        let mut sampler =
            Sampler::with_soil(climate, MockSoilProbe::new(0), SoilCalibration::default());

        assert_eq!(sampler.sample(), Err(SampleError::NotANumber));
        assert_eq!(sampler.sample(), Err(SampleError::NotANumber));
        // Soil is never read when climate is invalid
        assert_eq!(sampler.soil().map(|s| s.reads), Some(0));
    }

    #[test]
    fn test_sensor_error_fails_sample() {
        let mut climate = MockClimateSensor::new();
        climate.queue_error(SensorError::Checksum);
        let mut sampler = Sampler::climate_only(climate);

        assert_eq!(
            sampler.sample(),
            Err(SampleError::Climate(SensorError::Checksum))
        );
    }

    #[test]
    fn test_soil_error_fails_sample() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(24.5, 60.0);
        let mut probe = MockSoilProbe::new(0);
        probe.raw = Err(SensorError::Adc);
        let mut sampler = Sampler::with_soil(climate, probe, SoilCalibration::default());

        assert_eq!(sampler.sample(), Err(SampleError::Soil(SensorError::Adc)));
    }

    #[test]
    fn test_fahrenheit() {
        assert_eq!(fahrenheit(0.0), 32.0);
        assert!((fahrenheit(100.0) - 212.0).abs() < 1e-3);
        assert!(fahrenheit(f32::NAN).is_nan());
    }
}

//! Sensor traits so the sampler can run against mocks on the host

/// Errors from a sensor read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Sensor did not answer or a bit took too long
    Timeout,
    /// DHT frame checksum mismatch
    Checksum,
    /// GPIO could not be driven or read
    Gpio,
    /// ADC conversion failed
    Adc,
}

/// One temperature/humidity reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Temperature and relative humidity source
pub trait ClimateSensor {
    /// Blocking read; a DHT11 needs about 25 ms
    fn read(&mut self) -> Result<ClimateReading, SensorError>;
}

/// Raw analog soil moisture source
pub trait SoilProbe {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

#[cfg(test)]
pub mod mock {
    //! Mock sensors for testing

    use super::*;
    use heapless::Vec;

    /// Returns queued readings in order, then times out
    #[derive(Default)]
    pub struct MockClimateSensor {
        queue: Vec<Result<ClimateReading, SensorError>, 16>,
        pub reads: u32,
    }

    impl MockClimateSensor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_reading(&mut self, temperature_c: f32, humidity_pct: f32) {
            let _ = self.queue.push(Ok(ClimateReading {
                temperature_c,
                humidity_pct,
            }));
        }

        pub fn queue_error(&mut self, error: SensorError) {
            let _ = self.queue.push(Err(error));
        }
    }

    impl ClimateSensor for MockClimateSensor {
        fn read(&mut self) -> Result<ClimateReading, SensorError> {
            self.reads += 1;
            if self.queue.is_empty() {
                Err(SensorError::Timeout)
            } else {
                self.queue.remove(0)
            }
        }
    }

    /// Always returns the same raw value
    pub struct MockSoilProbe {
        pub raw: Result<u16, SensorError>,
        pub reads: u32,
    }

    impl MockSoilProbe {
        pub fn new(raw: u16) -> Self {
            Self { raw: Ok(raw), reads: 0 }
        }
    }

    impl SoilProbe for MockSoilProbe {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.reads += 1;
            self.raw
        }
    }
}

//! Climate (DHT11) and soil moisture (HW-080) sensing

#[cfg(feature = "embedded")]
pub mod adc;
pub mod dht11;
pub mod sampler;
pub mod soil;
pub mod traits;

#[cfg(feature = "embedded")]
pub use adc::AdcSoilProbe;
pub use dht11::Dht11;
pub use sampler::{fahrenheit, NoSoil, SampleError, Sampler, SensorSample};
pub use soil::SoilCalibration;
pub use traits::{ClimateReading, ClimateSensor, SensorError, SoilProbe};

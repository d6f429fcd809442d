//! Hardware and link configuration for the SIESPRO sensor and receiver nodes
//!
//! Constants describe the boards as wired (ESP32 sensor node, ESP32-C3 Mini
//! receiver, both with an SX1278 module). The config structs gather them into
//! values that are validated once at startup.

use crate::lora::traits::LoraConfig;
use crate::payload::csv::PayloadLayout;
use crate::reliable::{NetworkId, RetryBudget};
use crate::sensors::soil::SoilCalibration;

/// SPI and control pins for the SX1278 on the ESP32 sensor node
pub mod sensor_node_pins {
    pub const SCLK: u8 = 18;
    pub const MISO: u8 = 19;
    pub const MOSI: u8 = 23;
    pub const NSS: u8 = 5;
    pub const NRESET: u8 = 14;
    pub const DIO0: u8 = 2;

    /// DHT11 data line
    pub const DHT: u8 = 17;
    /// HW-080 analog output (ADC1)
    pub const SOIL_ADC: u8 = 33;
}

/// SPI and control pins for the SX1278 on the ESP32-C3 Mini receiver
///
/// Chosen to avoid the GPIO8/GPIO9 strapping pins.
pub mod receiver_pins {
    pub const SCLK: u8 = 10;
    pub const MISO: u8 = 5;
    pub const MOSI: u8 = 6;
    pub const NSS: u8 = 7;
    pub const NRESET: u8 = 3;
    pub const DIO0: u8 = 2;
}

/// Default LoRa configuration
pub mod lora_defaults {
    /// 434 MHz ISM band
    pub const FREQUENCY_HZ: u32 = 434_000_000;
    pub const SPREADING_FACTOR: u8 = 7;
    pub const BANDWIDTH_KHZ: u32 = 125;
    /// Coding rate 4/5
    pub const CODING_RATE: u8 = 5;
    pub const TX_POWER_DBM: i8 = 10;

    /// Legal range of the SX127x PA_BOOST output
    pub const MIN_TX_POWER_DBM: i8 = 2;
    pub const MAX_TX_POWER_DBM: i8 = 20;

    /// SX1276/77/78 synthesiser range
    pub const MIN_FREQUENCY_HZ: u32 = 137_000_000;
    pub const MAX_FREQUENCY_HZ: u32 = 1_020_000_000;
}

/// Reliable link defaults shared by both ends of a pair
pub mod reliable_defaults {
    pub const NETWORK_ID: u16 = 0x3210;

    pub const ACK_TIMEOUT_MS: u32 = 1000;
    pub const TX_TIMEOUT_MS: u32 = 1000;
    pub const TX_ATTEMPTS: u8 = 10;

    /// Gap between delivery attempts
    pub const ATTEMPT_GAP_MS: u32 = 500;

    /// Receiver waits this long before sending the ACK
    pub const ACK_DELAY_MS: u32 = 100;
    pub const ACK_TX_POWER_DBM: i8 = 2;
    pub const RX_TIMEOUT_MS: u32 = 60_000;
}

/// Control loop timing
pub mod timing {
    /// Delay between sensor node cycles
    pub const CYCLE_DELAY_MS: u32 = 5000;

    /// The DHT11 delivers at most one measurement per second
    pub const MIN_SAMPLE_INTERVAL_MS: u32 = 1000;

    /// Sleep period of the fatal stall loop
    pub const HALT_SLEEP_MS: u64 = 2000;

    /// Settle time after the radio is detected
    pub const RADIO_SETTLE_MS: u64 = 1000;
}

/// HW-080 calibration (raw ADC readings)
pub mod soil_defaults {
    /// Probe in dry air
    pub const RAW_DRY: u16 = 4092;
    /// Probe in water
    pub const RAW_WET: u16 = 0;
}

/// Frame size limits
pub mod protocol {
    /// SX127x FIFO holds at most one 255-byte packet
    pub const MAX_LORA_PAYLOAD: usize = 255;

    /// Largest reliable frame (payload + trailer)
    pub const MAX_RELIABLE_FRAME: usize = 251;

    /// Network id (u16) + payload CRC (u16)
    pub const RELIABLE_TRAILER_LEN: usize = 4;

    /// Largest payload a reliable frame can carry
    pub const MAX_RELIABLE_PAYLOAD: usize = MAX_RELIABLE_FRAME - RELIABLE_TRAILER_LEN;

    /// CSV payload buffer
    pub const MAX_CSV_LEN: usize = 64;
}

/// Unacknowledged data acquisition mode
pub mod plain_defaults {
    /// The sender waits this long for TX done
    pub const TX_TIMEOUT_MS: u32 = 10_000;
    pub const RX_TIMEOUT_MS: u32 = 60_000;
    /// Pause before each sample; the DHT11 limit
    pub const CYCLE_DELAY_MS: u32 = 1000;
}

/// Polling exchange defaults
pub mod polling {
    pub const REPLY_WINDOW_MS: u32 = 1500;
    pub const POLL_INTERVAL_MS: u32 = 8000;
}

/// JSON uplink configuration
pub mod uplink {
    /// REST endpoint receiving one JSON record per acknowledged delivery
    pub const SERVER_URL: &str = "https://siespro.onrender.com/sensors/data";

    /// Give up waiting for the access point after this long at startup
    pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 30_000;

    /// Set with `export WIFI_SSID=value` at build time.
    pub const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");
    /// Set with `export WIFI_PASS=value` at build time.
    pub const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASS");
}

/// Reasons a configuration is refused at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Carrier frequency outside the synthesiser range
    Frequency,
    /// Spreading factor outside 6..=12
    SpreadingFactor,
    /// Bandwidth is not one of the SX127x settings
    Bandwidth,
    /// Coding rate denominator outside 5..=8
    CodingRate,
    /// TX power outside the PA_BOOST range
    TxPower,
    /// Retry budget allows no attempt, or a zero timeout
    RetryBudget,
    /// Sampling faster than the DHT11 allows
    SampleInterval,
    /// Soil calibration with identical end points
    SoilCalibration,
}

/// Bandwidth settings accepted by the SX127x modem (kHz, rounded down)
const VALID_BANDWIDTHS_KHZ: [u32; 10] = [7, 10, 15, 20, 31, 41, 62, 125, 250, 500];

/// Check modulation parameters against what the SX127x supports
pub fn validate_radio(config: &LoraConfig) -> Result<(), ConfigError> {
    if !(lora_defaults::MIN_FREQUENCY_HZ..=lora_defaults::MAX_FREQUENCY_HZ)
        .contains(&config.frequency_hz)
    {
        return Err(ConfigError::Frequency);
    }
    if !(6..=12).contains(&config.spreading_factor) {
        return Err(ConfigError::SpreadingFactor);
    }
    if !VALID_BANDWIDTHS_KHZ.contains(&config.bandwidth_khz) {
        return Err(ConfigError::Bandwidth);
    }
    if !(5..=8).contains(&config.coding_rate) {
        return Err(ConfigError::CodingRate);
    }
    validate_tx_power(config.tx_power_dbm)
}

fn validate_tx_power(power_dbm: i8) -> Result<(), ConfigError> {
    if (lora_defaults::MIN_TX_POWER_DBM..=lora_defaults::MAX_TX_POWER_DBM).contains(&power_dbm) {
        Ok(())
    } else {
        Err(ConfigError::TxPower)
    }
}

/// Configuration of the sensor node (sender side of a reliable pair)
#[derive(Debug, Clone)]
pub struct SensorNodeConfig {
    pub radio: LoraConfig,
    pub network_id: NetworkId,
    pub budget: RetryBudget,
    /// Gap between delivery attempts
    pub attempt_gap_ms: u32,
    /// Delay between control loop cycles
    pub cycle_delay_ms: u32,
    /// Fields carried in the radio payload
    pub layout: PayloadLayout,
    pub soil: SoilCalibration,
}

impl Default for SensorNodeConfig {
    fn default() -> Self {
        Self {
            radio: LoraConfig::default(),
            network_id: NetworkId(reliable_defaults::NETWORK_ID),
            budget: RetryBudget::default(),
            attempt_gap_ms: reliable_defaults::ATTEMPT_GAP_MS,
            cycle_delay_ms: timing::CYCLE_DELAY_MS,
            layout: PayloadLayout::ClimateSoil,
            soil: SoilCalibration::default(),
        }
    }
}

impl SensorNodeConfig {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_radio(&self.radio)?;
        if self.budget.max_attempts == 0
            || self.budget.ack_timeout_ms == 0
            || self.budget.send_timeout_ms == 0
        {
            return Err(ConfigError::RetryBudget);
        }
        if self.cycle_delay_ms < timing::MIN_SAMPLE_INTERVAL_MS {
            return Err(ConfigError::SampleInterval);
        }
        if self.soil.raw_dry == self.soil.raw_wet {
            return Err(ConfigError::SoilCalibration);
        }
        Ok(())
    }
}

/// Configuration of the receiver node (auto-ACK side of a reliable pair)
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub radio: LoraConfig,
    pub network_id: NetworkId,
    pub ack_delay_ms: u32,
    pub ack_tx_power_dbm: i8,
    /// Timeout for the ACK transmission itself
    pub ack_send_timeout_ms: u32,
    pub rx_timeout_ms: u32,
    /// Layout used to decode accepted payloads, if they carry samples
    pub layout: Option<PayloadLayout>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            radio: LoraConfig::default(),
            network_id: NetworkId(reliable_defaults::NETWORK_ID),
            ack_delay_ms: reliable_defaults::ACK_DELAY_MS,
            ack_tx_power_dbm: reliable_defaults::ACK_TX_POWER_DBM,
            ack_send_timeout_ms: reliable_defaults::TX_TIMEOUT_MS,
            rx_timeout_ms: reliable_defaults::RX_TIMEOUT_MS,
            layout: Some(PayloadLayout::ClimateSoil),
        }
    }
}

impl ReceiverConfig {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_radio(&self.radio)?;
        validate_tx_power(self.ack_tx_power_dbm)?;
        if self.rx_timeout_ms == 0 || self.ack_send_timeout_ms == 0 {
            return Err(ConfigError::RetryBudget);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(SensorNodeConfig::default().validate(), Ok(()));
        assert_eq!(ReceiverConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_radio_settings() {
        let mut config = SensorNodeConfig::default();
        config.radio.frequency_hz = 2_400_000_000;
        assert_eq!(config.validate(), Err(ConfigError::Frequency));

        let mut config = SensorNodeConfig::default();
        config.radio.spreading_factor = 13;
        assert_eq!(config.validate(), Err(ConfigError::SpreadingFactor));

        let mut config = SensorNodeConfig::default();
        config.radio.bandwidth_khz = 100;
        assert_eq!(config.validate(), Err(ConfigError::Bandwidth));

        let mut config = SensorNodeConfig::default();
        config.radio.coding_rate = 4;
        assert_eq!(config.validate(), Err(ConfigError::CodingRate));

        let mut config = SensorNodeConfig::default();
        config.radio.tx_power_dbm = 23;
        assert_eq!(config.validate(), Err(ConfigError::TxPower));
    }

    #[test]
    fn test_rejects_empty_retry_budget() {
        let mut config = SensorNodeConfig::default();
        config.budget.max_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::RetryBudget));
    }

    #[test]
    fn test_rejects_fast_sampling() {
        let mut config = SensorNodeConfig::default();
        config.cycle_delay_ms = 500;
        assert_eq!(config.validate(), Err(ConfigError::SampleInterval));
    }

    #[test]
    fn test_receiver_rejects_bad_ack_power() {
        let mut config = ReceiverConfig::default();
        config.ack_tx_power_dbm = 0;
        assert_eq!(config.validate(), Err(ConfigError::TxPower));
    }
}

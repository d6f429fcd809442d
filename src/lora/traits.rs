//! LoRa radio trait for abstraction and testability
//!
//! This trait defines the interface for LoRa radio operations,
//! allowing the actual hardware driver to be swapped with a mock for testing.

use crate::config::protocol::MAX_LORA_PAYLOAD;
use core::future::Future;
use heapless::Vec;

/// Errors that can occur during LoRa operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoraError {
    /// Operation timed out
    Timeout,
    /// CRC error in received packet
    CrcError,
    /// Packet header failed validation
    HeaderError,
    /// Transmission failed
    TransmitFailed,
    /// Reception failed
    ReceiveFailed,
    /// Invalid configuration or payload size
    InvalidConfig,
    /// No SX127x answered on the SPI bus
    DeviceNotFound,
    /// SPI communication error
    SpiError,
    /// Radio not initialised
    NotInitialised,
}

/// SX127x IRQ flag bits, as latched after the last operation
pub mod irq {
    pub const RX_TIMEOUT: u16 = 0x80;
    pub const RX_DONE: u16 = 0x40;
    pub const PAYLOAD_CRC_ERROR: u16 = 0x20;
    pub const VALID_HEADER: u16 = 0x10;
    pub const TX_DONE: u16 = 0x08;
    pub const CAD_DONE: u16 = 0x04;
    pub const FHSS_CHANGE_CHANNEL: u16 = 0x02;
    pub const CAD_DETECTED: u16 = 0x01;

    /// Flag names in register bit order, for diagnostics
    pub const NAMES: [(u16, &str); 8] = [
        (RX_TIMEOUT, "IRQ_RX_TIMEOUT"),
        (RX_DONE, "IRQ_RX_DONE"),
        (PAYLOAD_CRC_ERROR, "IRQ_CRC_ERROR"),
        (VALID_HEADER, "IRQ_HEADER_VALID"),
        (TX_DONE, "IRQ_TX_DONE"),
        (CAD_DONE, "IRQ_CAD_DONE"),
        (FHSS_CHANGE_CHANNEL, "IRQ_FHSS_CHANGE"),
        (CAD_DETECTED, "IRQ_CAD_DETECTED"),
    ];

    /// Names of the flags set in `status`
    pub fn names(status: u16) -> impl Iterator<Item = &'static str> {
        NAMES
            .iter()
            .filter(move |(bit, _)| status & bit != 0)
            .map(|(_, name)| *name)
    }
}

/// Configuration for LoRa modulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraConfig {
    /// Centre frequency in Hz
    pub frequency_hz: u32,
    /// Spreading factor (6-12)
    pub spreading_factor: u8,
    /// Bandwidth in kHz (7.8, 10.4, 15.6, 20.8, 31.25, 41.7, 62.5, 125, 250, 500)
    pub bandwidth_khz: u32,
    /// Coding rate denominator (5-8 for 4/5 to 4/8)
    pub coding_rate: u8,
    /// Default transmit power in dBm
    pub tx_power_dbm: i8,
}

impl Default for LoraConfig {
    fn default() -> Self {
        use crate::config::lora_defaults;

        Self {
            frequency_hz: lora_defaults::FREQUENCY_HZ,
            spreading_factor: lora_defaults::SPREADING_FACTOR,
            bandwidth_khz: lora_defaults::BANDWIDTH_KHZ,
            coding_rate: lora_defaults::CODING_RATE,
            tx_power_dbm: lora_defaults::TX_POWER_DBM,
        }
    }
}

/// Received packet with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct RxPacket {
    /// Received data
    pub data: Vec<u8, MAX_LORA_PAYLOAD>,
    /// Received Signal Strength Indicator in dBm
    pub rssi: i16,
    /// Signal-to-Noise Ratio in dB
    pub snr: i8,
}

/// Abstract LoRa radio interface for testability
///
/// The reliable link and the control loops work with either the real SX127x
/// hardware driver or a mock implementation for testing.
pub trait LoraRadio {
    /// Initialise the radio hardware
    ///
    /// Fails with [`LoraError::DeviceNotFound`] when no radio answers.
    fn init(&mut self) -> impl Future<Output = Result<(), LoraError>>;

    /// Transmit data over LoRa at the given power
    ///
    /// Waits until transmission is complete, an error occurs, or `timeout_ms`
    /// elapses.
    fn transmit(
        &mut self,
        data: &[u8],
        tx_power_dbm: i8,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<(), LoraError>>;

    /// Receive data with timeout
    ///
    /// Listens for incoming packets until one is received or the timeout expires.
    fn receive(&mut self, timeout_ms: u32) -> impl Future<Output = Result<RxPacket, LoraError>>;

    /// Configure the radio parameters
    fn configure(&mut self, config: &LoraConfig) -> impl Future<Output = Result<(), LoraError>>;

    /// Set the radio to standby mode
    fn set_standby(&mut self) -> impl Future<Output = Result<(), LoraError>>;

    /// IRQ flags latched by the most recent transmit or receive
    ///
    /// Only meaningful straight after the operation that produced it.
    fn irq_status(&self) -> u16;
}

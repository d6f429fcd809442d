//! SX127x LoRa driver
//!
//! Register-level driver for the SX1276/77/78 family, implementing the
//! LoraRadio trait for use with Embassy.

use crate::config::protocol::MAX_LORA_PAYLOAD;
use crate::lora::traits::{irq, LoraConfig, LoraError, LoraRadio, RxPacket};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::spi::SpiBus;
use heapless::Vec;

/// SX127x register addresses (LoRa mode)
mod reg {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const FRF_MSB: u8 = 0x06;
    pub const FRF_MID: u8 = 0x07;
    pub const FRF_LSB: u8 = 0x08;
    pub const PA_CONFIG: u8 = 0x09;
    pub const OCP: u8 = 0x0B;
    pub const LNA: u8 = 0x0C;
    pub const FIFO_ADDR_PTR: u8 = 0x0D;
    pub const FIFO_TX_BASE_ADDR: u8 = 0x0E;
    pub const FIFO_RX_BASE_ADDR: u8 = 0x0F;
    pub const FIFO_RX_CURRENT_ADDR: u8 = 0x10;
    pub const IRQ_FLAGS: u8 = 0x12;
    pub const RX_NB_BYTES: u8 = 0x13;
    pub const PKT_SNR_VALUE: u8 = 0x19;
    pub const PKT_RSSI_VALUE: u8 = 0x1A;
    pub const MODEM_CONFIG_1: u8 = 0x1D;
    pub const MODEM_CONFIG_2: u8 = 0x1E;
    pub const PREAMBLE_MSB: u8 = 0x20;
    pub const PREAMBLE_LSB: u8 = 0x21;
    pub const PAYLOAD_LENGTH: u8 = 0x22;
    pub const MODEM_CONFIG_3: u8 = 0x26;
    pub const SYNC_WORD: u8 = 0x39;
    pub const DIO_MAPPING_1: u8 = 0x40;
    pub const VERSION: u8 = 0x42;
    pub const PA_DAC: u8 = 0x4D;
}

/// Operating modes
mod mode {
    pub const LONG_RANGE: u8 = 0x80;
    pub const SLEEP: u8 = 0x00;
    pub const STDBY: u8 = 0x01;
    pub const TX: u8 = 0x03;
    pub const RX_CONTINUOUS: u8 = 0x05;
}

/// DIO0 mappings
mod dio0 {
    pub const RX_DONE: u8 = 0x00;
    pub const TX_DONE: u8 = 0x40;
}

/// Silicon revision reported by every SX1276/77/78/79
const SX127X_VERSION: u8 = 0x12;

/// Private network sync word
const SYNC_WORD_PRIVATE: u8 = 0x12;

/// Preamble length in symbols
const PREAMBLE_SYMBOLS: u16 = 8;

/// Upper edge of the low frequency port (RSSI offset differs per port)
const LF_PORT_MAX_HZ: u32 = 525_000_000;

/// Control pins for SX127x
pub struct Sx127xPins<Nss, Dio0, Nrst> {
    pub nss: Nss,
    pub dio0: Dio0,
    pub nrst: Nrst,
}

/// SX127x LoRa driver
///
/// Implements the LoraRadio trait using dependency injection for SPI and GPIO pins.
/// Uses SpiBus trait with manual NSS control.
pub struct Sx127xDriver<Spi, Nss, Dio0, Nrst>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio0: InputPin,
    Nrst: OutputPin,
{
    spi: Spi,
    nss: Nss,
    dio0: Dio0,
    nrst: Nrst,
    initialised: bool,
    config: LoraConfig,
    irq: u16,
}

impl<Spi, Nss, Dio0, Nrst> Sx127xDriver<Spi, Nss, Dio0, Nrst>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio0: InputPin,
    Nrst: OutputPin,
{
    /// Create a new SX127x driver, applying `config` on init
    pub fn new(spi: Spi, pins: Sx127xPins<Nss, Dio0, Nrst>, config: LoraConfig) -> Self {
        Self {
            spi,
            nss: pins.nss,
            dio0: pins.dio0,
            nrst: pins.nrst,
            initialised: false,
            config,
            irq: 0,
        }
    }

    /// Reset the radio
    async fn reset(&mut self) {
        let _ = self.nrst.set_low();
        Timer::after(Duration::from_millis(10)).await;
        let _ = self.nrst.set_high();
        Timer::after(Duration::from_millis(10)).await;
    }

    /// Read a single register
    async fn read_register(&mut self, addr: u8) -> Result<u8, LoraError> {
        let _ = self.nss.set_low();

        let tx_buf = [addr & 0x7F, 0x00];
        let mut rx_buf = [0u8; 2];
        let result = self.spi.transfer(&mut rx_buf, &tx_buf).await;

        let _ = self.nss.set_high();
        result.map_err(|_| LoraError::SpiError)?;

        Ok(rx_buf[1])
    }

    /// Write a single register
    async fn write_register(&mut self, addr: u8, value: u8) -> Result<(), LoraError> {
        let _ = self.nss.set_low();

        let result = self.spi.write(&[addr | 0x80, value]).await;

        let _ = self.nss.set_high();
        result.map_err(|_| LoraError::SpiError)
    }

    /// Burst write into the FIFO at the current address pointer
    async fn write_fifo(&mut self, data: &[u8]) -> Result<(), LoraError> {
        let _ = self.nss.set_low();

        let mut buf = [0u8; MAX_LORA_PAYLOAD + 1];
        buf[0] = reg::FIFO | 0x80;
        let len = data.len().min(MAX_LORA_PAYLOAD);
        buf[1..1 + len].copy_from_slice(&data[..len]);

        let result = self.spi.write(&buf[..1 + len]).await;

        let _ = self.nss.set_high();
        result.map_err(|_| LoraError::SpiError)
    }

    /// Burst read from the FIFO at the current address pointer
    async fn read_fifo(&mut self, len: usize) -> Result<Vec<u8, MAX_LORA_PAYLOAD>, LoraError> {
        let _ = self.nss.set_low();

        // Address byte, then one byte clocked out per data byte
        let mut tx_buf = [0u8; MAX_LORA_PAYLOAD + 1];
        let mut rx_buf = [0u8; MAX_LORA_PAYLOAD + 1];
        tx_buf[0] = reg::FIFO & 0x7F;

        let total_len = 1 + len.min(MAX_LORA_PAYLOAD);
        let result = self
            .spi
            .transfer(&mut rx_buf[..total_len], &tx_buf[..total_len])
            .await;

        let _ = self.nss.set_high();
        result.map_err(|_| LoraError::SpiError)?;

        let mut data = Vec::new();
        data.extend_from_slice(&rx_buf[1..total_len])
            .map_err(|_| LoraError::ReceiveFailed)?;

        Ok(data)
    }

    /// Set operating mode (LoRa bit always set)
    async fn set_mode(&mut self, op: u8) -> Result<(), LoraError> {
        self.write_register(reg::OP_MODE, mode::LONG_RANGE | op)
            .await
    }

    /// Set RF frequency
    async fn set_frequency(&mut self, freq_hz: u32) -> Result<(), LoraError> {
        // Frf = (freq_rf * 2^19) / 32MHz
        let frf = ((freq_hz as u64) << 19) / 32_000_000;
        self.write_register(reg::FRF_MSB, ((frf >> 16) & 0xFF) as u8)
            .await?;
        self.write_register(reg::FRF_MID, ((frf >> 8) & 0xFF) as u8)
            .await?;
        self.write_register(reg::FRF_LSB, (frf & 0xFF) as u8).await
    }

    /// Set modulation parameters
    async fn set_modulation_params(&mut self, config: &LoraConfig) -> Result<(), LoraError> {
        let bw: u8 = match config.bandwidth_khz {
            7 | 8 => 0,   // 7.8 kHz
            10 => 1,      // 10.4 kHz
            15 | 16 => 2, // 15.6 kHz
            20 | 21 => 3, // 20.8 kHz
            31 => 4,      // 31.25 kHz
            41 | 42 => 5, // 41.7 kHz
            62 | 63 => 6, // 62.5 kHz
            125 => 7,     // 125 kHz
            250 => 8,     // 250 kHz
            500 => 9,     // 500 kHz
            _ => return Err(LoraError::InvalidConfig),
        };

        let cr: u8 = match config.coding_rate {
            5..=8 => config.coding_rate - 4,
            _ => return Err(LoraError::InvalidConfig),
        };

        if !(6..=12).contains(&config.spreading_factor) {
            return Err(LoraError::InvalidConfig);
        }

        // Explicit header mode
        self.write_register(reg::MODEM_CONFIG_1, (bw << 4) | (cr << 1))
            .await?;

        // Payload CRC on
        self.write_register(reg::MODEM_CONFIG_2, (config.spreading_factor << 4) | 0x04)
            .await?;

        // Low data rate optimisation when a symbol lasts longer than 16 ms
        let symbol_over_16ms = (1u32 << config.spreading_factor) > 16 * config.bandwidth_khz;
        let ldro = if symbol_over_16ms { 0x08 } else { 0x00 };
        // AGC auto on
        self.write_register(reg::MODEM_CONFIG_3, ldro | 0x04).await
    }

    /// Set over-current protection trim
    async fn set_current_limit(&mut self, current_ma: u16) -> Result<(), LoraError> {
        let trim = if current_ma <= 120 {
            (current_ma.saturating_sub(45)) / 5
        } else if current_ma <= 240 {
            (current_ma + 30) / 10
        } else {
            27
        };
        self.write_register(reg::OCP, 0x20 | (trim as u8 & 0x1F))
            .await
    }

    /// Set TX power on the PA_BOOST pin
    async fn set_tx_power(&mut self, power_dbm: i8) -> Result<(), LoraError> {
        let mut level = power_dbm.clamp(2, 20);

        if level > 17 {
            // High power mode needs the +20 dBm DAC and a higher current limit
            self.write_register(reg::PA_DAC, 0x87).await?;
            self.set_current_limit(140).await?;
            level -= 3;
        } else {
            self.write_register(reg::PA_DAC, 0x84).await?;
            self.set_current_limit(100).await?;
        }

        self.write_register(reg::PA_CONFIG, 0x80 | (level as u8 - 2))
            .await
    }

    /// Read and clear IRQ flags
    async fn take_irq_flags(&mut self) -> Result<u16, LoraError> {
        let flags = self.read_register(reg::IRQ_FLAGS).await? as u16;
        self.write_register(reg::IRQ_FLAGS, 0xFF).await?;
        self.irq = flags;
        Ok(flags)
    }

    /// Wait for DIO0 to go high, giving up at the deadline
    async fn wait_for_dio0(&mut self, timeout_ms: u32) -> bool {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);

        loop {
            if self.dio0.is_high().unwrap_or(false) {
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            Timer::after(Duration::from_micros(100)).await;
        }
    }

    /// Get RSSI and SNR of the last received packet
    async fn get_packet_status(&mut self) -> Result<(i16, i8), LoraError> {
        let snr = (self.read_register(reg::PKT_SNR_VALUE).await? as i8) / 4;
        let raw_rssi = self.read_register(reg::PKT_RSSI_VALUE).await? as i16;

        let offset = if self.config.frequency_hz <= LF_PORT_MAX_HZ {
            164
        } else {
            157
        };
        let mut rssi = raw_rssi - offset;
        if snr < 0 {
            rssi += snr as i16;
        }

        Ok((rssi, snr))
    }
}

impl<Spi, Nss, Dio0, Nrst> LoraRadio for Sx127xDriver<Spi, Nss, Dio0, Nrst>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio0: InputPin,
    Nrst: OutputPin,
{
    async fn init(&mut self) -> Result<(), LoraError> {
        let _ = self.nss.set_high();
        self.reset().await;

        // Check the radio is there at all
        let version = self.read_register(reg::VERSION).await?;
        if version != SX127X_VERSION {
            return Err(LoraError::DeviceNotFound);
        }

        // LoRa mode can only be selected from sleep
        self.write_register(reg::OP_MODE, mode::SLEEP).await?;
        self.set_mode(mode::SLEEP).await?;

        // Whole FIFO for one packet in either direction
        self.write_register(reg::FIFO_TX_BASE_ADDR, 0x00).await?;
        self.write_register(reg::FIFO_RX_BASE_ADDR, 0x00).await?;

        // LNA boost
        let lna = self.read_register(reg::LNA).await?;
        self.write_register(reg::LNA, lna | 0x03).await?;

        self.write_register(reg::PREAMBLE_MSB, (PREAMBLE_SYMBOLS >> 8) as u8)
            .await?;
        self.write_register(reg::PREAMBLE_LSB, (PREAMBLE_SYMBOLS & 0xFF) as u8)
            .await?;
        self.write_register(reg::SYNC_WORD, SYNC_WORD_PRIVATE).await?;

        let config = self.config.clone();
        self.configure(&config).await?;

        self.set_mode(mode::STDBY).await?;

        self.initialised = true;
        Ok(())
    }

    async fn transmit(&mut self, data: &[u8], tx_power_dbm: i8, timeout_ms: u32) -> Result<(), LoraError> {
        if !self.initialised {
            return Err(LoraError::NotInitialised);
        }

        if data.is_empty() || data.len() > MAX_LORA_PAYLOAD {
            return Err(LoraError::InvalidConfig);
        }

        self.set_mode(mode::STDBY).await?;
        self.set_tx_power(tx_power_dbm).await?;

        // Write data to FIFO
        self.write_register(reg::FIFO_ADDR_PTR, 0x00).await?;
        self.write_fifo(data).await?;
        self.write_register(reg::PAYLOAD_LENGTH, data.len() as u8)
            .await?;

        // DIO0 on TX done
        self.write_register(reg::DIO_MAPPING_1, dio0::TX_DONE).await?;
        self.write_register(reg::IRQ_FLAGS, 0xFF).await?;

        self.set_mode(mode::TX).await?;

        let done = self.wait_for_dio0(timeout_ms).await;
        let irq_status = self.take_irq_flags().await?;
        self.set_mode(mode::STDBY).await?;

        if !done {
            return Err(LoraError::Timeout);
        }

        if irq_status & irq::TX_DONE != 0 {
            Ok(())
        } else {
            Err(LoraError::TransmitFailed)
        }
    }

    async fn receive(&mut self, timeout_ms: u32) -> Result<RxPacket, LoraError> {
        if !self.initialised {
            return Err(LoraError::NotInitialised);
        }

        self.set_mode(mode::STDBY).await?;

        // DIO0 on RX done
        self.write_register(reg::DIO_MAPPING_1, dio0::RX_DONE).await?;
        self.write_register(reg::FIFO_ADDR_PTR, 0x00).await?;
        self.write_register(reg::IRQ_FLAGS, 0xFF).await?;

        // Continuous RX with the deadline kept in software
        self.set_mode(mode::RX_CONTINUOUS).await?;

        if !self.wait_for_dio0(timeout_ms).await {
            self.set_mode(mode::STDBY).await?;
            self.irq = irq::RX_TIMEOUT;
            return Err(LoraError::Timeout);
        }

        let irq_status = self.take_irq_flags().await?;

        if irq_status & irq::PAYLOAD_CRC_ERROR != 0 {
            self.set_mode(mode::STDBY).await?;
            return Err(LoraError::CrcError);
        }

        if irq_status & irq::VALID_HEADER == 0 {
            self.set_mode(mode::STDBY).await?;
            return Err(LoraError::HeaderError);
        }

        if irq_status & irq::RX_DONE == 0 {
            self.set_mode(mode::STDBY).await?;
            return Err(LoraError::ReceiveFailed);
        }

        let payload_len = self.read_register(reg::RX_NB_BYTES).await?;
        let current_addr = self.read_register(reg::FIFO_RX_CURRENT_ADDR).await?;
        self.write_register(reg::FIFO_ADDR_PTR, current_addr).await?;

        let data = self.read_fifo(payload_len as usize).await?;
        let (rssi, snr) = self.get_packet_status().await?;

        self.set_mode(mode::STDBY).await?;

        Ok(RxPacket { data, rssi, snr })
    }

    async fn configure(&mut self, config: &LoraConfig) -> Result<(), LoraError> {
        // Configuration registers are only writable outside TX/RX
        self.set_mode(mode::STDBY).await?;

        self.set_frequency(config.frequency_hz).await?;
        self.set_modulation_params(config).await?;
        self.set_tx_power(config.tx_power_dbm).await?;

        self.config = config.clone();

        Ok(())
    }

    async fn set_standby(&mut self) -> Result<(), LoraError> {
        self.set_mode(mode::STDBY).await
    }

    fn irq_status(&self) -> u16 {
        self.irq
    }
}

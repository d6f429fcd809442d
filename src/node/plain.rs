//! Unacknowledged data acquisition
//!
//! The sender transmits each CSV sample once and counts what went out. The
//! receiver prints every packet it hears with uptime and signal figures,
//! keeping RX timeouts apart from packets that failed the radio CRC or
//! header check. Payloads carry no trailer and nothing is acknowledged.

use super::poller::MonotonicClock;
use crate::config::plain_defaults;
use crate::lora::traits::{irq, LoraError, LoraRadio, RxPacket};
use crate::payload::{format_payload, PayloadError, PayloadLayout};
use crate::sensors::{fahrenheit, ClimateSensor, SampleError, Sampler, SoilProbe};
use log::{info, warn};

fn log_irq_names(status: u16) {
    for name in irq::names(status) {
        warn!("  {}", name);
    }
}

/// Sender counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainSenderStats {
    pub packets_sent: u32,
    pub send_errors: u32,
    pub failed_samples: u32,
}

/// How one send cycle ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlainSendOutcome {
    SampleFailed(SampleError),
    PayloadFailed(PayloadError),
    Sent { bytes: usize, packets: u32 },
    SendError { length: usize, irq: u16, error: LoraError },
}

pub struct PlainSender<R, C, P> {
    radio: R,
    sampler: Sampler<C, P>,
    layout: PayloadLayout,
    tx_power_dbm: i8,
    tx_timeout_ms: u32,
    stats: PlainSenderStats,
}

impl<R, C, P> PlainSender<R, C, P>
where
    R: LoraRadio,
    C: ClimateSensor,
    P: SoilProbe,
{
    pub fn new(radio: R, sampler: Sampler<C, P>, layout: PayloadLayout, tx_power_dbm: i8) -> Self {
        Self {
            radio,
            sampler,
            layout,
            tx_power_dbm,
            tx_timeout_ms: plain_defaults::TX_TIMEOUT_MS,
            stats: PlainSenderStats::default(),
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn stats(&self) -> &PlainSenderStats {
        &self.stats
    }

    /// Sample, format and transmit once
    pub async fn send_once(&mut self) -> PlainSendOutcome {
        let sample = match self.sampler.sample() {
            Ok(sample) => sample,
            Err(e) => {
                self.stats.failed_samples = self.stats.failed_samples.wrapping_add(1);
                return PlainSendOutcome::SampleFailed(e);
            }
        };

        info!(
            "DHT11 -> Humidity: {:.2}%  Temperature: {:.2} C, {:.2} F",
            sample.humidity_pct,
            sample.temperature_c,
            fahrenheit(sample.temperature_c)
        );
        if let Some(soil) = sample.soil_moisture_pct {
            info!("HW-080 -> Soil moisture: {} %", soil);
        }

        let payload = match format_payload(&sample, self.layout) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("CSV formatting error: {:?}", e);
                return PlainSendOutcome::PayloadFailed(e);
            }
        };
        info!("{} dBm  Packet CSV> {}", self.tx_power_dbm, payload);

        let length = payload.len();
        match self
            .radio
            .transmit(payload.as_bytes(), self.tx_power_dbm, self.tx_timeout_ms)
            .await
        {
            Ok(()) => {
                self.stats.packets_sent = self.stats.packets_sent.wrapping_add(1);
                info!(
                    "BytesSent,{}  PacketsSent,{}",
                    length, self.stats.packets_sent
                );
                PlainSendOutcome::Sent {
                    bytes: length,
                    packets: self.stats.packets_sent,
                }
            }
            Err(error) => {
                self.stats.send_errors = self.stats.send_errors.wrapping_add(1);
                let status = self.radio.irq_status();
                warn!("SendError, Length,{}, IRQreg,{:X}", length, status);
                log_irq_names(status);
                PlainSendOutcome::SendError {
                    length,
                    irq: status,
                    error,
                }
            }
        }
    }
}

/// Receiver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainReceiverStats {
    pub packets: u32,
    /// Packets that failed the radio CRC or header check
    pub errors: u32,
    pub timeouts: u32,
    pub radio_errors: u32,
}

/// Result of one listen
#[derive(Debug, Clone, PartialEq)]
pub enum PlainReceiveOutcome {
    Packet { packet: RxPacket, uptime_s: u64 },
    Timeout,
    PacketError { irq: u16, error: LoraError },
    RadioError(LoraError),
}

pub struct PlainReceiver<R, K> {
    radio: R,
    clock: K,
    rx_timeout_ms: u32,
    stats: PlainReceiverStats,
}

impl<R, K> PlainReceiver<R, K>
where
    R: LoraRadio,
    K: MonotonicClock,
{
    pub fn new(radio: R, clock: K) -> Self {
        Self {
            radio,
            clock,
            rx_timeout_ms: plain_defaults::RX_TIMEOUT_MS,
            stats: PlainReceiverStats::default(),
        }
    }

    pub fn with_rx_timeout(mut self, rx_timeout_ms: u32) -> Self {
        self.rx_timeout_ms = rx_timeout_ms;
        self
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn stats(&self) -> &PlainReceiverStats {
        &self.stats
    }

    /// Uptime in whole seconds, rounded
    fn uptime_s(&self) -> u64 {
        (self.clock.now_ms() + 500) / 1000
    }

    /// Listen once for up to the RX timeout
    pub async fn receive_once(&mut self) -> PlainReceiveOutcome {
        let result = self.radio.receive(self.rx_timeout_ms).await;
        let status = self.radio.irq_status();
        let uptime_s = self.uptime_s();

        match result {
            Ok(packet) => {
                self.stats.packets = self.stats.packets.wrapping_add(1);
                match core::str::from_utf8(&packet.data) {
                    Ok(text) => info!(
                        "{}s  {},RSSI,{}dBm,SNR,{}dB,Length,{},Packets,{},Errors,{},IRQreg,{:X}",
                        uptime_s,
                        text,
                        packet.rssi,
                        packet.snr,
                        packet.data.len(),
                        self.stats.packets,
                        self.stats.errors,
                        status
                    ),
                    Err(_) => info!(
                        "{}s  <binary>,RSSI,{}dBm,SNR,{}dB,Length,{},Packets,{},Errors,{},IRQreg,{:X}",
                        uptime_s,
                        packet.rssi,
                        packet.snr,
                        packet.data.len(),
                        self.stats.packets,
                        self.stats.errors,
                        status
                    ),
                }
                PlainReceiveOutcome::Packet { packet, uptime_s }
            }
            Err(LoraError::Timeout) => {
                self.stats.timeouts = self.stats.timeouts.wrapping_add(1);
                warn!("{}s RXTimeout", uptime_s);
                PlainReceiveOutcome::Timeout
            }
            Err(error @ (LoraError::CrcError | LoraError::HeaderError)) => {
                self.stats.errors = self.stats.errors.wrapping_add(1);
                warn!(
                    "{}s PacketError,Packets,{},Errors,{},IRQreg,{:X}",
                    uptime_s, self.stats.packets, self.stats.errors, status
                );
                log_irq_names(status);
                PlainReceiveOutcome::PacketError { irq: status, error }
            }
            Err(error) => {
                self.stats.radio_errors = self.stats.radio_errors.wrapping_add(1);
                warn!("{}s Radio error: {:?}", uptime_s, error);
                PlainReceiveOutcome::RadioError(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lora::traits::mock::MockLoraRadio;
    use crate::sensors::soil::SoilCalibration;
    use crate::sensors::traits::mock::{MockClimateSensor, MockSoilProbe};
    use crate::sensors::SensorError;

    struct FixedClock(u64);

    impl MonotonicClock for FixedClock {
        fn now_ms(&self) -> u64 {
            self.0
        }
    }

    fn sender(
        climate: MockClimateSensor,
    ) -> PlainSender<MockLoraRadio, MockClimateSensor, MockSoilProbe> {
        let sampler = Sampler::with_soil(
            climate,
            MockSoilProbe::new(2560),
            SoilCalibration::default(),
        );
        PlainSender::new(MockLoraRadio::new(), sampler, PayloadLayout::ClimateSoil, 10)
    }

    #[test]
    fn test_sender_counts_packets() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(24.5, 60.0);
        climate.queue_reading(25.0, 58.0);
        let mut sender = sender(climate);

        futures::executor::block_on(async {
            assert_eq!(
                sender.send_once().await,
                PlainSendOutcome::Sent {
                    bytes: 14,
                    packets: 1
                }
            );
            assert_eq!(
                sender.send_once().await,
                PlainSendOutcome::Sent {
                    bytes: 14,
                    packets: 2
                }
            );
        });

        let history = sender.radio().get_tx_history();
        assert_eq!(history.len(), 2);
        // Bare CSV, no trailer
        assert_eq!(history[0].data.as_slice(), b"24.50,60.00,37");
        assert_eq!(history[0].tx_power_dbm, 10);
        assert_eq!(sender.stats().packets_sent, 2);
    }

    #[test]
    fn test_sender_error_leaves_packet_count() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(24.5, 60.0);
        climate.queue_reading(24.5, 60.0);
        let mut sender = sender(climate);
        sender.radio().set_next_tx_error(LoraError::Timeout);

        futures::executor::block_on(async {
            assert!(matches!(
                sender.send_once().await,
                PlainSendOutcome::SendError {
                    length: 14,
                    error: LoraError::Timeout,
                    ..
                }
            ));
            assert_eq!(
                sender.send_once().await,
                PlainSendOutcome::Sent {
                    bytes: 14,
                    packets: 1
                }
            );
        });

        assert_eq!(
            *sender.stats(),
            PlainSenderStats {
                packets_sent: 1,
                send_errors: 1,
                failed_samples: 0,
            }
        );
    }

    #[test]
    fn test_sender_skips_invalid_sample() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(f32::NAN, 60.0);
        climate.queue_error(SensorError::Timeout);
        let mut sender = sender(climate);

        futures::executor::block_on(async {
            assert_eq!(
                sender.send_once().await,
                PlainSendOutcome::SampleFailed(SampleError::NotANumber)
            );
            assert!(matches!(
                sender.send_once().await,
                PlainSendOutcome::SampleFailed(SampleError::Climate(_))
            ));
        });

        assert!(sender.radio().get_tx_history().is_empty());
        assert_eq!(sender.stats().failed_samples, 2);
    }

    #[test]
    fn test_sender_format_failure_sends_nothing() {
        let mut climate = MockClimateSensor::new();
        climate.queue_reading(24.5, 60.0);
        let mut sender = PlainSender::new(
            MockLoraRadio::new(),
            Sampler::climate_only(climate),
            PayloadLayout::ClimateSoil,
            10,
        );

        let outcome = futures::executor::block_on(sender.send_once());
        assert_eq!(
            outcome,
            PlainSendOutcome::PayloadFailed(PayloadError::MissingSoil)
        );
        assert!(sender.radio().get_tx_history().is_empty());
    }

    #[test]
    fn test_receiver_reports_packet_with_uptime() {
        let radio = MockLoraRadio::new();
        radio.queue_rx_bytes(b"24.50,60.00,37", -44, 9);
        let mut receiver = PlainReceiver::new(radio, FixedClock(8_400));

        match futures::executor::block_on(receiver.receive_once()) {
            PlainReceiveOutcome::Packet { packet, uptime_s } => {
                assert_eq!(packet.data.as_slice(), b"24.50,60.00,37");
                assert_eq!(packet.rssi, -44);
                assert_eq!(packet.snr, 9);
                assert_eq!(uptime_s, 8);
            }
            other => panic!("Expected packet, got {:?}", other),
        }
        assert_eq!(receiver.stats().packets, 1);
    }

    #[test]
    fn test_receiver_splits_timeout_from_packet_error() {
        let radio = MockLoraRadio::new();
        radio.queue_rx_error(LoraError::CrcError);
        radio.queue_rx_bytes(b"24.50,60.00,37", -50, 7);
        radio.queue_rx_error(LoraError::HeaderError);
        radio.queue_rx_error(LoraError::SpiError);
        let mut receiver = PlainReceiver::new(radio, FixedClock(137_000)).with_rx_timeout(1000);

        futures::executor::block_on(async {
            match receiver.receive_once().await {
                PlainReceiveOutcome::PacketError { irq: status, error } => {
                    assert_eq!(error, LoraError::CrcError);
                    assert!(status & irq::PAYLOAD_CRC_ERROR != 0);
                }
                other => panic!("Expected packet error, got {:?}", other),
            }
            assert!(matches!(
                receiver.receive_once().await,
                PlainReceiveOutcome::Packet { .. }
            ));
            assert!(matches!(
                receiver.receive_once().await,
                PlainReceiveOutcome::PacketError {
                    error: LoraError::HeaderError,
                    ..
                }
            ));
            assert_eq!(
                receiver.receive_once().await,
                PlainReceiveOutcome::RadioError(LoraError::SpiError)
            );
            // Queue drained: the mock times out
            assert_eq!(receiver.receive_once().await, PlainReceiveOutcome::Timeout);
        });

        assert_eq!(
            *receiver.stats(),
            PlainReceiverStats {
                packets: 1,
                errors: 2,
                timeouts: 1,
                radio_errors: 1,
            }
        );
        assert_eq!(receiver.radio().irq_status(), irq::RX_TIMEOUT);
    }
}

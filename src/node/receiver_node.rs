//! Auto-ACK receiver
//!
//! Waits for reliable frames, acknowledges valid ones and reports what it
//! saw on the console. Rejected frames are counted and logged with the
//! latched IRQ flags.

use crate::config::ReceiverConfig;
use crate::lora::traits::{irq, LoraRadio};
use crate::payload::parse_payload;
use crate::reliable::{ReceiveError, ReceivedFrame, RejectReason, ReliableLink};
use crate::sensors::SensorSample;
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

/// Counters kept across receive calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub packets: u32,
    pub rejected: u32,
    pub timeouts: u32,
    pub ack_failures: u32,
    pub radio_errors: u32,
}

/// Result of one receive call
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveOutcome {
    /// Frame accepted and acknowledged; `sample` is set when the payload parsed
    Accepted {
        frame: ReceivedFrame,
        sample: Option<SensorSample>,
    },
    Timeout,
    Rejected(RejectReason),
    AckFailed,
    RadioError,
}

pub struct ReceiverNode<R, D> {
    link: ReliableLink<R, D>,
    config: ReceiverConfig,
    stats: ReceiverStats,
}

impl<R, D> ReceiverNode<R, D>
where
    R: LoraRadio,
    D: DelayNs,
{
    pub fn new(link: ReliableLink<R, D>, config: ReceiverConfig) -> Self {
        Self {
            link,
            config,
            stats: ReceiverStats::default(),
        }
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn link(&self) -> &ReliableLink<R, D> {
        &self.link
    }

    /// Wait for one frame (or the RX timeout) and handle it
    pub async fn receive_once(&mut self) -> ReceiveOutcome {
        let network_id = self.config.network_id;
        let result = self
            .link
            .receive_reliable(
                network_id,
                self.config.ack_delay_ms,
                self.config.ack_tx_power_dbm,
                self.config.ack_send_timeout_ms,
                self.config.rx_timeout_ms,
            )
            .await;

        let outcome = match result {
            Ok(frame) => {
                self.stats.packets = self.stats.packets.wrapping_add(1);
                self.report_accepted(frame)
            }
            Err(ReceiveError::Timeout) => {
                self.stats.timeouts = self.stats.timeouts.wrapping_add(1);
                warn!("Error RX timeout");
                ReceiveOutcome::Timeout
            }
            Err(ReceiveError::Rejected(reason)) => {
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                self.report_rejected(reason);
                ReceiveOutcome::Rejected(reason)
            }
            Err(ReceiveError::AckFailed(e)) => {
                self.stats.ack_failures = self.stats.ack_failures.wrapping_add(1);
                warn!("Frame accepted but ACK failed: {:?}", e);
                ReceiveOutcome::AckFailed
            }
            Err(ReceiveError::Radio(e)) => {
                self.stats.radio_errors = self.stats.radio_errors.wrapping_add(1);
                warn!("Radio error: {:?}", e);
                ReceiveOutcome::RadioError
            }
        };

        if outcome_is_error(&outcome) {
            let status = self.link.irq_status();
            warn!("IRQ 0x{:04X}", status);
            for name in irq::names(status) {
                warn!("  {}", name);
            }
        }

        outcome
    }

    fn report_accepted(&self, frame: ReceivedFrame) -> ReceiveOutcome {
        match core::str::from_utf8(&frame.payload) {
            Ok(text) => info!("Payload received OK > {}", text),
            Err(_) => info!("Payload received OK > {} bytes", frame.payload_length()),
        }
        info!(
            "LocalNetworkID,0x{:04X},TransmitterNetworkID,0x{:04X},LocalPayloadCRC,0x{:04X},RXPayloadCRC,0x{:04X}",
            self.config.network_id.0, frame.network_id.0, frame.payload_crc, frame.trailer_crc
        );
        info!(
            "RSSI {}dBm SNR {}dB Length {} Packets {} Errors {}",
            frame.rssi,
            frame.snr,
            frame.payload_length(),
            self.stats.packets,
            self.stats.rejected
        );

        let sample = match self.config.layout {
            Some(layout) => match parse_payload(&frame.payload, layout) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!("Payload is not a sample: {:?}", e);
                    None
                }
            },
            None => None,
        };

        ReceiveOutcome::Accepted { frame, sample }
    }

    fn report_rejected(&self, reason: RejectReason) {
        let local = self.config.network_id.0;
        match reason {
            RejectReason::NetworkIdMismatch { received } => warn!(
                "Error LocalNetworkID,0x{:04X},TransmitterNetworkID,0x{:04X}",
                local, received.0
            ),
            RejectReason::PayloadCrcMismatch {
                local: local_crc,
                received,
            } => warn!(
                "Error LocalNetworkID,0x{:04X},LocalPayloadCRC,0x{:04X},RXPayloadCRC,0x{:04X}",
                local, local_crc, received
            ),
            other => warn!("Error frame rejected: {:?}", other),
        }
    }
}

fn outcome_is_error(outcome: &ReceiveOutcome) -> bool {
    !matches!(outcome, ReceiveOutcome::Accepted { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lora::traits::mock::MockLoraRadio;
    use crate::lora::traits::LoraError;
    use crate::payload::PayloadLayout;
    use crate::reliable::frame;
    use crate::reliable::link::mock::MockDelay;
    use crate::reliable::NetworkId;

    fn receiver() -> ReceiverNode<MockLoraRadio, MockDelay> {
        ReceiverNode::new(
            ReliableLink::new(MockLoraRadio::new(), MockDelay::new()),
            ReceiverConfig::default(),
        )
    }

    #[test]
    fn test_accepts_and_parses_sample() {
        let mut node = receiver();
        let sent = frame::encode(b"24.50,60.00,37", NetworkId(0x3210)).unwrap();
        node.link().radio().queue_rx_bytes(&sent, -44, 9);

        let outcome = futures::executor::block_on(node.receive_once());

        match outcome {
            ReceiveOutcome::Accepted { frame, sample } => {
                assert_eq!(frame.payload.as_slice(), b"24.50,60.00,37");
                let sample = sample.expect("Should parse");
                assert_eq!(sample.soil_moisture_pct, Some(37));
                assert_eq!(frame.network_id, NetworkId(0x3210));
                assert_eq!(frame.trailer_crc, frame::payload_crc(b"24.50,60.00,37"));
            }
            other => panic!("Expected accepted frame, got {:?}", other),
        }
        assert_eq!(node.stats().packets, 1);
        assert_eq!(node.link().radio().get_tx_history().len(), 1);
    }

    #[test]
    fn test_unparsable_payload_still_accepted() {
        let mut node = receiver();
        let sent = frame::encode(b"hello", NetworkId(0x3210)).unwrap();
        node.link().radio().queue_rx_bytes(&sent, -44, 9);

        let outcome = futures::executor::block_on(node.receive_once());
        assert!(matches!(
            outcome,
            ReceiveOutcome::Accepted { sample: None, .. }
        ));
    }

    #[test]
    fn test_raw_payload_mode() {
        let config = ReceiverConfig {
            layout: None,
            ..ReceiverConfig::default()
        };
        let mut node = ReceiverNode::new(
            ReliableLink::new(MockLoraRadio::new(), MockDelay::new()),
            config,
        );
        let sent = frame::encode(b"24.50,60.00", NetworkId(0x3210)).unwrap();
        node.link().radio().queue_rx_bytes(&sent, -44, 9);

        let outcome = futures::executor::block_on(node.receive_once());
        assert!(matches!(
            outcome,
            ReceiveOutcome::Accepted { sample: None, .. }
        ));
    }

    #[test]
    fn test_foreign_network_not_acknowledged() {
        let mut node = receiver();
        let sent = frame::encode(b"24.50,60.00,37", NetworkId(0x0001)).unwrap();
        node.link().radio().queue_rx_bytes(&sent, -44, 9);

        let outcome = futures::executor::block_on(node.receive_once());

        assert_eq!(
            outcome,
            ReceiveOutcome::Rejected(RejectReason::NetworkIdMismatch {
                received: NetworkId(0x0001)
            })
        );
        assert_eq!(node.stats().rejected, 1);
        assert!(node.link().radio().get_tx_history().is_empty());
    }

    #[test]
    fn test_counts_timeouts_and_errors() {
        let mut node = receiver();
        node.link().radio().queue_rx_error(LoraError::HeaderError);

        futures::executor::block_on(async {
            assert_eq!(
                node.receive_once().await,
                ReceiveOutcome::Rejected(RejectReason::Header)
            );
            assert_eq!(node.receive_once().await, ReceiveOutcome::Timeout);
        });

        assert_eq!(
            *node.stats(),
            ReceiverStats {
                rejected: 1,
                timeouts: 1,
                ..ReceiverStats::default()
            }
        );
    }

    #[test]
    fn test_ack_failure_counted() {
        let mut node = receiver();
        let sent = frame::encode(b"x", NetworkId(0x3210)).unwrap();
        node.link().radio().queue_rx_bytes(&sent, -44, 9);
        node.link().radio().set_next_tx_error(LoraError::Timeout);

        let outcome = futures::executor::block_on(node.receive_once());
        assert_eq!(outcome, ReceiveOutcome::AckFailed);
        assert_eq!(node.stats().ack_failures, 1);
    }

    #[test]
    fn test_climate_layout() {
        let config = ReceiverConfig {
            layout: Some(PayloadLayout::Climate),
            ..ReceiverConfig::default()
        };
        let mut node = ReceiverNode::new(
            ReliableLink::new(MockLoraRadio::new(), MockDelay::new()),
            config,
        );
        let sent = frame::encode(b"21.00,40.00", NetworkId(0x3210)).unwrap();
        node.link().radio().queue_rx_bytes(&sent, -60, 4);

        match futures::executor::block_on(node.receive_once()) {
            ReceiveOutcome::Accepted { sample: Some(s), .. } => {
                assert_eq!(s.temperature_c, 21.0);
                assert_eq!(s.soil_moisture_pct, None);
            }
            other => panic!("Expected parsed sample, got {:?}", other),
        }
    }
}

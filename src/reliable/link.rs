//! Reliable send and receive over a LoraRadio
//!
//! One send is one attempt: transmit the frame, then listen for the ACK.
//! One receive waits for a frame, validates it, and answers with the ACK
//! before returning.

use super::frame::{self, FrameError, ReliableFrame};
use super::NetworkId;
use crate::config::protocol::{MAX_RELIABLE_FRAME, MAX_RELIABLE_PAYLOAD};
use crate::lora::traits::{LoraError, LoraRadio};
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use log::{debug, warn};

/// Payload refused before the radio is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliableError {
    EmptyPayload,
    PayloadTooLong,
}

impl From<FrameError> for ReliableError {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::EmptyPayload => ReliableError::EmptyPayload,
            FrameError::PayloadTooLong | FrameError::TooShort => ReliableError::PayloadTooLong,
        }
    }
}

/// Why a single attempt did not get acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The transmission itself did not finish in time
    SendTimeout,
    /// Nothing came back within the ACK timeout
    NoAck,
    /// Something came back that was not our ACK
    AckMismatch,
    /// Radio error while sending or listening
    Radio(LoraError),
}

/// Outcome of one reliable send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAttemptResult {
    pub success: bool,
    /// Transmitted frame length, 0 on failure
    pub payload_length: usize,
    pub ack_rssi: i16,
    pub ack_snr: i8,
    pub payload_crc: u16,
    pub failure: Option<SendFailure>,
}

impl LinkAttemptResult {
    fn delivered(frame_length: usize, payload_crc: u16, ack_rssi: i16, ack_snr: i8) -> Self {
        Self {
            success: true,
            payload_length: frame_length,
            ack_rssi,
            ack_snr,
            payload_crc,
            failure: None,
        }
    }

    fn failed(payload_crc: u16, failure: SendFailure) -> Self {
        Self {
            success: false,
            payload_length: 0,
            ack_rssi: 0,
            ack_snr: 0,
            payload_crc,
            failure: Some(failure),
        }
    }
}

/// Why a received frame was dropped without an ACK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Radio-level packet CRC failed
    PacketCrc,
    /// LoRa header failed
    Header,
    /// Frame shorter than payload plus trailer
    TooShort,
    /// Frame longer than the largest reliable frame
    TooLong { length: usize },
    NetworkIdMismatch { received: NetworkId },
    PayloadCrcMismatch { local: u16, received: u16 },
}

/// Errors from a reliable receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveError {
    /// Nothing arrived within the RX timeout
    Timeout,
    /// A frame arrived but failed validation
    Rejected(RejectReason),
    /// The frame was valid but the ACK could not be sent
    AckFailed(LoraError),
    Radio(LoraError),
}

/// An accepted and acknowledged frame
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFrame {
    pub payload: Vec<u8, MAX_RELIABLE_PAYLOAD>,
    pub rssi: i16,
    pub snr: i8,
    /// CRC recomputed over the received payload
    pub payload_crc: u16,
    /// Network id carried in the trailer
    pub network_id: NetworkId,
    /// CRC carried in the trailer
    pub trailer_crc: u16,
}

impl ReceivedFrame {
    /// Frame length minus the trailer
    pub fn payload_length(&self) -> usize {
        self.payload.len()
    }
}

/// Reliable link over an owned radio
pub struct ReliableLink<R, D> {
    radio: R,
    delay: D,
}

impl<R, D> ReliableLink<R, D>
where
    R: LoraRadio,
    D: DelayNs,
{
    pub fn new(radio: R, delay: D) -> Self {
        Self { radio, delay }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// IRQ flags latched by the last radio operation
    pub fn irq_status(&self) -> u16 {
        self.radio.irq_status()
    }

    /// Send one frame and wait for its ACK
    pub async fn send_reliable(
        &mut self,
        payload: &[u8],
        network_id: NetworkId,
        ack_timeout_ms: u32,
        send_timeout_ms: u32,
        tx_power_dbm: i8,
    ) -> Result<LinkAttemptResult, ReliableError> {
        let frame = frame::encode(payload, network_id)?;
        let crc = frame::payload_crc(payload);

        match self
            .radio
            .transmit(&frame, tx_power_dbm, send_timeout_ms)
            .await
        {
            Ok(()) => {}
            Err(LoraError::Timeout) => {
                return Ok(LinkAttemptResult::failed(crc, SendFailure::SendTimeout));
            }
            Err(e) => {
                return Ok(LinkAttemptResult::failed(crc, SendFailure::Radio(e)));
            }
        }

        let ack = match self.radio.receive(ack_timeout_ms).await {
            Ok(packet) => packet,
            Err(LoraError::Timeout) => {
                return Ok(LinkAttemptResult::failed(crc, SendFailure::NoAck));
            }
            Err(e) => {
                return Ok(LinkAttemptResult::failed(crc, SendFailure::Radio(e)));
            }
        };

        match frame::decode_ack(&ack.data) {
            Some((ack_id, ack_crc)) if ack_id == network_id && ack_crc == crc => Ok(
                LinkAttemptResult::delivered(frame.len(), crc, ack.rssi, ack.snr),
            ),
            Some((ack_id, ack_crc)) => {
                debug!(
                    "ACK mismatch: id 0x{:04X} crc 0x{:04X}, expected 0x{:04X} 0x{:04X}",
                    ack_id.0, ack_crc, network_id.0, crc
                );
                Ok(LinkAttemptResult::failed(crc, SendFailure::AckMismatch))
            }
            None => {
                debug!("Not an ACK: {} bytes", ack.data.len());
                Ok(LinkAttemptResult::failed(crc, SendFailure::AckMismatch))
            }
        }
    }

    /// Wait for a frame for `network_id` and acknowledge it
    pub async fn receive_reliable(
        &mut self,
        network_id: NetworkId,
        ack_delay_ms: u32,
        ack_tx_power_dbm: i8,
        ack_send_timeout_ms: u32,
        rx_timeout_ms: u32,
    ) -> Result<ReceivedFrame, ReceiveError> {
        let packet = match self.radio.receive(rx_timeout_ms).await {
            Ok(packet) => packet,
            Err(LoraError::Timeout) => return Err(ReceiveError::Timeout),
            Err(LoraError::CrcError) => {
                return Err(ReceiveError::Rejected(RejectReason::PacketCrc))
            }
            Err(LoraError::HeaderError) => {
                return Err(ReceiveError::Rejected(RejectReason::Header))
            }
            Err(e) => return Err(ReceiveError::Radio(e)),
        };

        if packet.data.len() > MAX_RELIABLE_FRAME {
            return Err(ReceiveError::Rejected(RejectReason::TooLong {
                length: packet.data.len(),
            }));
        }

        let frame = ReliableFrame::split(&packet.data)
            .map_err(|_| ReceiveError::Rejected(RejectReason::TooShort))?;

        if frame.network_id != network_id {
            return Err(ReceiveError::Rejected(RejectReason::NetworkIdMismatch {
                received: frame.network_id,
            }));
        }

        let local = frame.local_crc();
        if local != frame.crc {
            return Err(ReceiveError::Rejected(RejectReason::PayloadCrcMismatch {
                local,
                received: frame.crc,
            }));
        }

        let mut payload = Vec::new();
        payload
            .extend_from_slice(frame.payload)
            .map_err(|_| {
                ReceiveError::Rejected(RejectReason::TooLong {
                    length: packet.data.len(),
                })
            })?;

        // Give the sender time to turn around into RX
        self.delay.delay_ms(ack_delay_ms).await;

        let ack = frame::encode_ack(network_id, local);
        if let Err(e) = self
            .radio
            .transmit(&ack, ack_tx_power_dbm, ack_send_timeout_ms)
            .await
        {
            warn!("ACK transmit failed: {:?}", e);
            return Err(ReceiveError::AckFailed(e));
        }

        Ok(ReceivedFrame {
            payload,
            rssi: packet.rssi,
            snr: packet.snr,
            payload_crc: local,
            network_id: frame.network_id,
            trailer_crc: frame.crc,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockDelay;
    use super::*;
    use crate::lora::traits::mock::MockLoraRadio;
    use crate::lora::traits::irq;

    const ID: NetworkId = NetworkId(0x3210);

    fn link() -> ReliableLink<MockLoraRadio, MockDelay> {
        ReliableLink::new(MockLoraRadio::new(), MockDelay::new())
    }

    #[test]
    fn test_send_acknowledged() {
        let mut link = link();
        let crc = frame::payload_crc(b"24.50,60.00,37");
        link.radio()
            .queue_rx_bytes(&frame::encode_ack(ID, crc), -44, 9);

        futures::executor::block_on(async {
            let result = link
                .send_reliable(b"24.50,60.00,37", ID, 1000, 1000, 10)
                .await
                .expect("Payload should be accepted");

            assert!(result.success);
            assert_eq!(result.payload_length, 14 + 4);
            assert_eq!(result.ack_rssi, -44);
            assert_eq!(result.ack_snr, 9);
            assert_eq!(result.payload_crc, crc);
            assert_eq!(result.failure, None);
        });

        let history = link.radio().get_tx_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_power_dbm, 10);
        assert_eq!(&history[0].data[..14], b"24.50,60.00,37");
    }

    #[test]
    fn test_send_without_ack() {
        let mut link = link();

        futures::executor::block_on(async {
            let result = link.send_reliable(b"hi", ID, 1000, 1000, 10).await.unwrap();
            assert!(!result.success);
            assert_eq!(result.payload_length, 0);
            assert_eq!(result.failure, Some(SendFailure::NoAck));
        });
        assert_eq!(link.irq_status(), irq::RX_TIMEOUT);
    }

    #[test]
    fn test_send_timeout() {
        let mut link = link();
        link.radio().set_next_tx_error(LoraError::Timeout);

        futures::executor::block_on(async {
            let result = link.send_reliable(b"hi", ID, 1000, 1000, 10).await.unwrap();
            assert_eq!(result.payload_length, 0);
            assert_eq!(result.failure, Some(SendFailure::SendTimeout));
        });
    }

    #[test]
    fn test_ack_for_other_network_is_failure() {
        let mut link = link();
        let crc = frame::payload_crc(b"hi");
        link.radio()
            .queue_rx_bytes(&frame::encode_ack(NetworkId(0x1111), crc), -50, 5);

        futures::executor::block_on(async {
            let result = link.send_reliable(b"hi", ID, 1000, 1000, 10).await.unwrap();
            assert!(!result.success);
            assert_eq!(result.failure, Some(SendFailure::AckMismatch));
        });
    }

    #[test]
    fn test_ack_with_wrong_crc_is_failure() {
        let mut link = link();
        link.radio()
            .queue_rx_bytes(&frame::encode_ack(ID, 0x0000), -50, 5);

        futures::executor::block_on(async {
            let result = link.send_reliable(b"hi", ID, 1000, 1000, 10).await.unwrap();
            assert_eq!(result.failure, Some(SendFailure::AckMismatch));
        });
    }

    #[test]
    fn test_send_rejects_bad_payload_without_touching_radio() {
        let mut link = link();
        let big = [0u8; MAX_RELIABLE_PAYLOAD + 1];

        futures::executor::block_on(async {
            assert_eq!(
                link.send_reliable(&[], ID, 1000, 1000, 10).await,
                Err(ReliableError::EmptyPayload)
            );
            assert_eq!(
                link.send_reliable(&big, ID, 1000, 1000, 10).await,
                Err(ReliableError::PayloadTooLong)
            );
        });
        assert!(link.radio().get_tx_history().is_empty());
    }

    #[test]
    fn test_receive_acknowledges_matching_frame() {
        let mut link = link();
        let sent = frame::encode(b"24.50,60.00,37", ID).unwrap();
        link.radio().queue_rx_bytes(&sent, -44, 9);

        futures::executor::block_on(async {
            let received = link
                .receive_reliable(ID, 100, 2, 1000, 60_000)
                .await
                .expect("Frame should be accepted");

            assert_eq!(received.payload.as_slice(), b"24.50,60.00,37");
            assert_eq!(received.payload_length(), sent.len() - 4);
            assert_eq!(received.rssi, -44);
            assert_eq!(received.snr, 9);
            assert_eq!(received.network_id, ID);
            assert_eq!(received.trailer_crc, received.payload_crc);
        });

        let crc = frame::payload_crc(b"24.50,60.00,37");
        let history = link.radio().get_tx_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].data.as_slice(), &frame::encode_ack(ID, crc));
        assert_eq!(history[0].tx_power_dbm, 2);
    }

    #[test]
    fn test_receive_waits_before_ack() {
        let mut link = link();
        link.radio()
            .queue_rx_bytes(&frame::encode(b"x", ID).unwrap(), -60, 3);

        futures::executor::block_on(async {
            link.receive_reliable(ID, 100, 2, 1000, 60_000).await.unwrap();
        });
        assert_eq!(link.delay.calls_ms.as_slice(), &[100]);
    }

    #[test]
    fn test_receive_rejects_foreign_network_without_ack() {
        let mut link = link();
        link.radio()
            .queue_rx_bytes(&frame::encode(b"hello", NetworkId(0x1234)).unwrap(), -44, 9);

        futures::executor::block_on(async {
            let result = link.receive_reliable(ID, 100, 2, 1000, 60_000).await;
            assert_eq!(
                result,
                Err(ReceiveError::Rejected(RejectReason::NetworkIdMismatch {
                    received: NetworkId(0x1234)
                }))
            );
        });
        assert!(link.radio().get_tx_history().is_empty());
    }

    #[test]
    fn test_receive_rejects_corrupted_payload() {
        let mut link = link();
        let mut sent = frame::encode(b"hello", ID).unwrap();
        sent[1] ^= 0xFF;
        link.radio().queue_rx_bytes(&sent, -44, 9);

        futures::executor::block_on(async {
            let result = link.receive_reliable(ID, 100, 2, 1000, 60_000).await;
            assert!(matches!(
                result,
                Err(ReceiveError::Rejected(RejectReason::PayloadCrcMismatch { .. }))
            ));
        });
        assert!(link.radio().get_tx_history().is_empty());
    }

    #[test]
    fn test_receive_distinguishes_timeout_from_rejection() {
        let mut link = link();
        link.radio().queue_rx_error(LoraError::CrcError);
        link.radio().queue_rx_bytes(&[0x10, 0x32], -44, 9);

        futures::executor::block_on(async {
            assert_eq!(
                link.receive_reliable(ID, 100, 2, 1000, 60_000).await,
                Err(ReceiveError::Rejected(RejectReason::PacketCrc))
            );
            assert_eq!(
                link.receive_reliable(ID, 100, 2, 1000, 60_000).await,
                Err(ReceiveError::Rejected(RejectReason::TooShort))
            );
            assert_eq!(
                link.receive_reliable(ID, 100, 2, 1000, 60_000).await,
                Err(ReceiveError::Timeout)
            );
        });
        assert_eq!(link.irq_status(), irq::RX_TIMEOUT);
    }

    #[test]
    fn test_receive_rejects_oversized_frame_as_too_long() {
        let mut link = link();
        // Valid id and CRC, but the payload is past the reliable limit
        let payload = [b'7'; 250];
        let crc = frame::payload_crc(&payload);
        let mut bytes: heapless::Vec<u8, 255> = heapless::Vec::new();
        bytes.extend_from_slice(&payload).unwrap();
        bytes.extend_from_slice(&ID.0.to_le_bytes()).unwrap();
        bytes.extend_from_slice(&crc.to_le_bytes()).unwrap();
        link.radio().queue_rx_bytes(&bytes, -44, 9);

        futures::executor::block_on(async {
            assert_eq!(
                link.receive_reliable(ID, 100, 2, 1000, 60_000).await,
                Err(ReceiveError::Rejected(RejectReason::TooLong { length: 254 }))
            );
        });
        assert!(link.radio().get_tx_history().is_empty());
    }

    #[test]
    fn test_receive_reports_ack_failure() {
        let mut link = link();
        link.radio()
            .queue_rx_bytes(&frame::encode(b"x", ID).unwrap(), -60, 3);
        link.radio().set_next_tx_error(LoraError::TransmitFailed);

        futures::executor::block_on(async {
            assert_eq!(
                link.receive_reliable(ID, 100, 2, 1000, 60_000).await,
                Err(ReceiveError::AckFailed(LoraError::TransmitFailed))
            );
        });
    }
}

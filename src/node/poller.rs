//! Plain request/response polling over the radio
//!
//! The poller sends `POLL:<id>` and listens for exactly `OK:<id>` until its
//! reply window closes, ignoring anything else heard meanwhile. A responder
//! answers its own poll and ignores everything else. No reliable framing is
//! involved on either side.

use crate::config::polling;
use crate::config::reliable_defaults::TX_TIMEOUT_MS;
use crate::lora::traits::{LoraError, LoraRadio};
use core::fmt::Write;
use heapless::String;
use log::{info, warn};

/// Longest poll or reply message
const MAX_MESSAGE_LEN: usize = 32;

/// Millisecond time source for reply windows
pub trait MonotonicClock {
    fn now_ms(&self) -> u64;
}

/// Result of polling one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Reply { rssi: i16, snr: i8 },
    /// No matching reply inside the window
    Timeout,
}

fn message(prefix: &str, id: &str) -> Result<String<MAX_MESSAGE_LEN>, LoraError> {
    let mut text = String::new();
    write!(text, "{}{}", prefix, id).map_err(|_| LoraError::InvalidConfig)?;
    Ok(text)
}

pub struct Poller<R, K> {
    radio: R,
    clock: K,
    window_ms: u32,
    tx_power_dbm: i8,
    /// Frames heard that were not the expected reply
    ignored: u32,
}

impl<R, K> Poller<R, K>
where
    R: LoraRadio,
    K: MonotonicClock,
{
    pub fn new(radio: R, clock: K, tx_power_dbm: i8) -> Self {
        Self {
            radio,
            clock,
            window_ms: polling::REPLY_WINDOW_MS,
            tx_power_dbm,
            ignored: 0,
        }
    }

    pub fn with_window(mut self, window_ms: u32) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn ignored(&self) -> u32 {
        self.ignored
    }

    /// Poll `target_id` and wait for its reply
    pub async fn poll(&mut self, target_id: &str) -> Result<PollOutcome, LoraError> {
        let request = message("POLL:", target_id)?;
        let expected = message("OK:", target_id)?;

        info!("[TX] {}", request);
        self.radio
            .transmit(request.as_bytes(), self.tx_power_dbm, TX_TIMEOUT_MS)
            .await?;

        let deadline = self.clock.now_ms() + self.window_ms as u64;

        loop {
            let now = self.clock.now_ms();
            if now >= deadline {
                break;
            }

            match self.radio.receive((deadline - now) as u32).await {
                Ok(packet) if packet.data.as_slice() == expected.as_bytes() => {
                    info!(
                        "[RX] {} | RSSI={} dBm | SNR={}",
                        expected, packet.rssi, packet.snr
                    );
                    return Ok(PollOutcome::Reply {
                        rssi: packet.rssi,
                        snr: packet.snr,
                    });
                }
                Ok(packet) => {
                    self.ignored = self.ignored.wrapping_add(1);
                    match core::str::from_utf8(&packet.data) {
                        Ok(text) => info!("[RX ignored] {}", text),
                        Err(_) => info!("[RX ignored] {} bytes", packet.data.len()),
                    }
                }
                Err(LoraError::Timeout) => break,
                Err(LoraError::CrcError) | Err(LoraError::HeaderError) => {
                    self.ignored = self.ignored.wrapping_add(1);
                }
                Err(e) => return Err(e),
            }
        }

        warn!("[TIMEOUT] No response from expected node.");
        Ok(PollOutcome::Timeout)
    }
}

/// Answers `POLL:<own id>` with `OK:<own id>`
pub struct Responder<R> {
    radio: R,
    poll: String<MAX_MESSAGE_LEN>,
    reply: String<MAX_MESSAGE_LEN>,
    tx_power_dbm: i8,
}

impl<R: LoraRadio> Responder<R> {
    pub fn new(radio: R, own_id: &str, tx_power_dbm: i8) -> Result<Self, LoraError> {
        Ok(Self {
            radio,
            poll: message("POLL:", own_id)?,
            reply: message("OK:", own_id)?,
            tx_power_dbm,
        })
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Listen once; returns true when a poll for us was answered
    pub async fn serve_once(&mut self, rx_timeout_ms: u32) -> Result<bool, LoraError> {
        let packet = match self.radio.receive(rx_timeout_ms).await {
            Ok(packet) => packet,
            Err(LoraError::Timeout) | Err(LoraError::CrcError) | Err(LoraError::HeaderError) => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };

        if packet.data.as_slice() != self.poll.as_bytes() {
            return Ok(false);
        }

        info!("[RX] {} | RSSI={} dBm", self.poll, packet.rssi);
        self.radio
            .transmit(self.reply.as_bytes(), self.tx_power_dbm, TX_TIMEOUT_MS)
            .await?;
        info!("[TX] {}", self.reply);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lora::traits::mock::MockLoraRadio;
    use core::cell::Cell;

    /// Advances by a fixed step every time it is read
    struct SteppingClock {
        now: Cell<u64>,
        step: u64,
    }

    impl SteppingClock {
        fn new(step: u64) -> Self {
            Self {
                now: Cell::new(0),
                step,
            }
        }
    }

    impl MonotonicClock for SteppingClock {
        fn now_ms(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    #[test]
    fn test_poll_gets_reply() {
        let radio = MockLoraRadio::new();
        radio.queue_rx_bytes(b"OK:A", -70, 6);
        let mut poller = Poller::new(radio, SteppingClock::new(10), 10);

        let outcome = futures::executor::block_on(poller.poll("A")).unwrap();

        assert_eq!(outcome, PollOutcome::Reply { rssi: -70, snr: 6 });
        let history = poller.radio().get_tx_history();
        assert_eq!(history[0].data.as_slice(), b"POLL:A");
    }

    #[test]
    fn test_poll_ignores_other_frames() {
        let radio = MockLoraRadio::new();
        radio.queue_rx_bytes(b"OK:B", -70, 6);
        radio.queue_rx_bytes(b"noise", -90, -3);
        radio.queue_rx_bytes(b"OK:A", -71, 5);
        let mut poller = Poller::new(radio, SteppingClock::new(10), 10);

        let outcome = futures::executor::block_on(poller.poll("A")).unwrap();

        assert_eq!(outcome, PollOutcome::Reply { rssi: -71, snr: 5 });
        assert_eq!(poller.ignored(), 2);
    }

    #[test]
    fn test_poll_times_out() {
        let radio = MockLoraRadio::new();
        let mut poller = Poller::new(radio, SteppingClock::new(10), 10);

        let outcome = futures::executor::block_on(poller.poll("B")).unwrap();
        assert_eq!(outcome, PollOutcome::Timeout);
    }

    #[test]
    fn test_window_closes_despite_chatter() {
        let radio = MockLoraRadio::new();
        for _ in 0..8 {
            radio.queue_rx_bytes(b"OK:B", -70, 6);
        }
        radio.queue_rx_bytes(b"OK:A", -70, 6);
        // Each clock read moves 500 ms, so the window closes before "OK:A"
        let mut poller = Poller::new(radio, SteppingClock::new(500), 10);

        let outcome = futures::executor::block_on(poller.poll("A")).unwrap();
        assert_eq!(outcome, PollOutcome::Timeout);
        assert!(poller.radio().pending_rx() > 0);
    }

    #[test]
    fn test_responder_answers_own_poll_only() {
        let radio = MockLoraRadio::new();
        radio.queue_rx_bytes(b"POLL:B", -60, 7);
        radio.queue_rx_bytes(b"POLL:A", -60, 7);
        let mut responder = Responder::new(radio, "A", 10).unwrap();

        futures::executor::block_on(async {
            assert_eq!(responder.serve_once(1000).await, Ok(false));
            assert_eq!(responder.serve_once(1000).await, Ok(true));
            assert_eq!(responder.serve_once(1000).await, Ok(false));
        });

        let history = responder.radio().get_tx_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].data.as_slice(), b"OK:A");
    }
}

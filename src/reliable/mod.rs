//! Reliable LoRa delivery with automatic acknowledgement
//!
//! Frames carry a network id and a payload CRC in a 4-byte trailer. The
//! receiving side echoes both back as an ACK; the sending side retries
//! within a bounded budget.

pub mod frame;
pub mod link;
pub mod retry;

use crate::config::reliable_defaults;

pub use frame::{FrameError, ReliableFrame};
pub use link::{
    LinkAttemptResult, ReceiveError, ReceivedFrame, RejectReason, ReliableError, ReliableLink,
    SendFailure,
};
pub use retry::{deliver, DeliveryPlan, DeliveryStatus, ReliableSender};

/// 16-bit identifier shared by a sender/receiver pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkId(pub u16);

impl Default for NetworkId {
    fn default() -> Self {
        Self(reliable_defaults::NETWORK_ID)
    }
}

/// Bounds on one reliable delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u8,
    /// How long to listen for the ACK after each send
    pub ack_timeout_ms: u32,
    /// How long the send itself may take
    pub send_timeout_ms: u32,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: reliable_defaults::TX_ATTEMPTS,
            ack_timeout_ms: reliable_defaults::ACK_TIMEOUT_MS,
            send_timeout_ms: reliable_defaults::TX_TIMEOUT_MS,
        }
    }
}

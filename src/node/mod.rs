//! Device roles: the sensor node control loop, the auto-ACK receiver, the
//! unacknowledged data acquisition pair and the plain polling exchange

pub mod plain;
pub mod poller;
pub mod receiver_node;
pub mod sensor_node;

pub use plain::{
    PlainReceiveOutcome, PlainReceiver, PlainReceiverStats, PlainSendOutcome, PlainSender,
    PlainSenderStats,
};
pub use poller::{MonotonicClock, PollOutcome, Poller, Responder};
pub use receiver_node::{ReceiveOutcome, ReceiverNode, ReceiverStats};
pub use sensor_node::{CycleOutcome, CycleReport, SensorNode, SensorNodeState};

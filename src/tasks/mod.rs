//! Embassy tasks module
//!
//! Control loops for each board, written as plain async functions so the
//! binaries can wrap them in `#[embassy_executor::task]` with concrete types.

pub mod plain;
pub mod poller;
pub mod receiver_node;
pub mod sensor_node;
#[cfg(feature = "uplink")]
pub mod wifi;

pub use plain::{plain_receiver_task, plain_sender_task};
pub use poller::{poller_task, responder_task};
pub use receiver_node::receiver_node_task;
pub use sensor_node::sensor_node_task;

use crate::config::timing::HALT_SLEEP_MS;
use crate::node::MonotonicClock;
use embassy_time::{Duration, Instant, Timer};
use log::error;

/// Reply-window clock backed by the embassy time driver
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl MonotonicClock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Park the device forever
///
/// Used when the radio is missing or the configuration is invalid. Nothing
/// else runs on the loop afterwards.
pub async fn halt(reason: &str) -> ! {
    error!("Halted: {}", reason);
    loop {
        Timer::after(Duration::from_millis(HALT_SLEEP_MS)).await;
    }
}

//! Polling exchange loops

use crate::config::polling::POLL_INTERVAL_MS;
use crate::lora::traits::LoraRadio;
use crate::node::{Poller, Responder};
use embassy_time::{Duration, Timer};
use log::warn;

use super::EmbassyClock;

/// Listen window of a responder between log checks
const RESPONDER_LISTEN_MS: u32 = 10_000;

/// Poll each target in turn, one every [`POLL_INTERVAL_MS`]
pub async fn poller_task<R: LoraRadio>(
    mut poller: Poller<R, EmbassyClock>,
    targets: &'static [&'static str],
) -> ! {
    if targets.is_empty() {
        super::halt("no poll targets").await;
    }

    loop {
        for target in targets {
            if let Err(e) = poller.poll(target).await {
                warn!("Poll of {} failed: {:?}", target, e);
            }
            Timer::after(Duration::from_millis(POLL_INTERVAL_MS as u64)).await;
        }
    }
}

pub async fn responder_task<R: LoraRadio>(mut responder: Responder<R>) -> ! {
    loop {
        if let Err(e) = responder.serve_once(RESPONDER_LISTEN_MS).await {
            warn!("Responder radio error: {:?}", e);
        }
    }
}

//! Unacknowledged data acquisition loops

use crate::config::plain_defaults::CYCLE_DELAY_MS;
use crate::lora::traits::LoraRadio;
use crate::node::{PlainReceiver, PlainSender};
use crate::sensors::{ClimateSensor, SoilProbe};
use embassy_time::{Duration, Timer};
use log::info;

use super::EmbassyClock;

/// Sample and transmit forever, pausing before each sample
pub async fn plain_sender_task<R, C, P>(mut sender: PlainSender<R, C, P>) -> !
where
    R: LoraRadio,
    C: ClimateSensor,
    P: SoilProbe,
{
    info!("Transmitter ready");

    loop {
        Timer::after(Duration::from_millis(CYCLE_DELAY_MS as u64)).await;
        sender.send_once().await;
    }
}

pub async fn plain_receiver_task<R: LoraRadio>(mut receiver: PlainReceiver<R, EmbassyClock>) -> ! {
    info!("Receiver ready");

    loop {
        receiver.receive_once().await;
    }
}

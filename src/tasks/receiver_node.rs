//! Receiver loop: listen, acknowledge, report

use crate::lora::traits::LoraRadio;
use crate::node::{ReceiveOutcome, ReceiverNode};
use embedded_hal_async::delay::DelayNs;
use log::info;

pub async fn receiver_node_task<R: LoraRadio, D: DelayNs>(mut node: ReceiverNode<R, D>) -> ! {
    info!("Receiver listening");

    loop {
        if let ReceiveOutcome::Accepted {
            sample: Some(sample),
            ..
        } = node.receive_once().await
        {
            match sample.soil_moisture_pct {
                Some(soil) => info!(
                    "Sample: {:.2} C, {:.2} %RH, soil {} %",
                    sample.temperature_c, sample.humidity_pct, soil
                ),
                None => info!(
                    "Sample: {:.2} C, {:.2} %RH",
                    sample.temperature_c, sample.humidity_pct
                ),
            }
        }
    }
}

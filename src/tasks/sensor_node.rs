//! Sensor node loop: one cycle, then the configured pause

use crate::node::{CycleOutcome, SensorNode};
use crate::payload::dataset_header;
use crate::reliable::ReliableSender;
use crate::sensors::{ClimateSensor, SoilProbe};
use crate::uplink::HttpClient;
use embassy_time::{Duration, Timer};
use embedded_hal_async::delay::DelayNs;
use log::debug;

/// Run the sensor node forever
///
/// The dataset header is printed once; each acknowledged cycle prints one
/// dataset line. Both go straight to the console without a log prefix so a
/// host can capture them.
pub async fn sensor_node_task<S, C, P, H, D>(mut node: SensorNode<S, C, P, H, D>) -> !
where
    S: ReliableSender,
    C: ClimateSensor,
    P: SoilProbe,
    H: HttpClient,
    D: DelayNs,
{
    let cycle_delay = Duration::from_millis(node.config().cycle_delay_ms as u64);

    esp_println::println!("{}", dataset_header(node.config().layout));

    loop {
        let report = node.run_cycle().await;

        if let Some(line) = &report.dataset_line {
            esp_println::println!("{}", line);
        }
        if let CycleOutcome::SampleFailed(e) = report.outcome {
            debug!("Cycle {} skipped: {:?}", node.state().cycles, e);
        }

        Timer::after(cycle_delay).await;
    }
}

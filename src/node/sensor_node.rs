//! Sensor node control loop
//!
//! One cycle: sample, format, deliver with retries, then print the dataset
//! line and forward to the uplink when the delivery was acknowledged. The
//! caller owns the pause between cycles.

use crate::config::SensorNodeConfig;
use crate::payload::dataset::{format_dataset_line, MAX_DATASET_LEN};
use crate::payload::{format_payload, PayloadError};
use crate::reliable::{deliver, DeliveryPlan, DeliveryStatus, ReliableError, ReliableSender};
use crate::sensors::{fahrenheit, ClimateSensor, SampleError, Sampler, SensorSample, SoilProbe};
use crate::uplink::{Disabled, HttpClient, UplinkError, UplinkRecord, UplinkReporter};
use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{info, warn};

/// What survives between cycles
#[derive(Debug, Clone, Default)]
pub struct SensorNodeState {
    /// Last valid sample; never replaced by a failed read
    pub last_sample: Option<SensorSample>,
    pub cycles: u32,
    pub failed_samples: u32,
    pub delivered: u32,
    pub exhausted: u32,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Sensor read failed or returned NaN; nothing sent
    SampleFailed(SampleError),
    /// Payload could not be formatted; nothing sent
    PayloadFailed(PayloadError),
    /// Payload refused by the link before sending
    Rejected(ReliableError),
    Delivered(DeliveryStatus),
    Exhausted(DeliveryStatus),
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Line for the serial dataset, set on acknowledged delivery
    pub dataset_line: Option<String<MAX_DATASET_LEN>>,
    /// Uplink result, when an uplink is attached and the delivery succeeded
    pub uplink: Option<Result<u16, UplinkError>>,
}

impl CycleReport {
    fn without_delivery(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            dataset_line: None,
            uplink: None,
        }
    }
}

pub struct SensorNode<S, C, P, H, D> {
    sender: S,
    sampler: Sampler<C, P>,
    reporter: Option<UplinkReporter<H>>,
    delay: D,
    config: SensorNodeConfig,
    state: SensorNodeState,
}

impl<S, C, P, D> SensorNode<S, C, P, Disabled, D>
where
    S: ReliableSender,
    C: ClimateSensor,
    P: SoilProbe,
    D: DelayNs,
{
    pub fn new(sender: S, sampler: Sampler<C, P>, delay: D, config: SensorNodeConfig) -> Self {
        Self {
            sender,
            sampler,
            reporter: None,
            delay,
            config,
            state: SensorNodeState::default(),
        }
    }
}

impl<S, C, P, H, D> SensorNode<S, C, P, H, D>
where
    S: ReliableSender,
    C: ClimateSensor,
    P: SoilProbe,
    H: HttpClient,
    D: DelayNs,
{
    /// Forward every acknowledged sample to `reporter`
    pub fn with_uplink<H2: HttpClient>(self, reporter: UplinkReporter<H2>) -> SensorNode<S, C, P, H2, D> {
        SensorNode {
            sender: self.sender,
            sampler: self.sampler,
            reporter: Some(reporter),
            delay: self.delay,
            config: self.config,
            state: self.state,
        }
    }

    pub fn state(&self) -> &SensorNodeState {
        &self.state
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn config(&self) -> &SensorNodeConfig {
        &self.config
    }

    pub fn reporter(&self) -> Option<&UplinkReporter<H>> {
        self.reporter.as_ref()
    }

    fn plan(&self) -> DeliveryPlan {
        DeliveryPlan {
            network_id: self.config.network_id,
            budget: self.config.budget,
            tx_power_dbm: self.config.radio.tx_power_dbm,
            attempt_gap_ms: self.config.attempt_gap_ms,
        }
    }

    /// Run one control loop cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.state.cycles = self.state.cycles.wrapping_add(1);
        info!("=== Sensor readings ===");

        let sample = match self.sampler.sample() {
            Ok(sample) => sample,
            Err(e) => {
                self.state.failed_samples = self.state.failed_samples.wrapping_add(1);
                return CycleReport::without_delivery(CycleOutcome::SampleFailed(e));
            }
        };
        self.state.last_sample = Some(sample);

        info!(
            "DHT11  | Humidity: {:.2}%  Temperature: {:.2} C, {:.2} F",
            sample.humidity_pct,
            sample.temperature_c,
            fahrenheit(sample.temperature_c)
        );
        if let Some(soil) = sample.soil_moisture_pct {
            info!("HW-080 | Soil moisture: {} %", soil);
        }

        let layout = self.config.layout;
        let payload = match format_payload(&sample, layout) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Payload formatting failed: {:?}", e);
                return CycleReport::without_delivery(CycleOutcome::PayloadFailed(e));
            }
        };
        info!("Transmit payload > {}", payload);

        let plan = self.plan();
        let status = match deliver(
            &mut self.sender,
            &mut self.delay,
            payload.as_bytes(),
            &plan,
            |attempt, _| info!("Send attempt {}", attempt),
        )
        .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!("Payload refused by link: {:?}", e);
                return CycleReport::without_delivery(CycleOutcome::Rejected(e));
            }
        };

        let Some(ack) = status.acknowledged().copied() else {
            self.state.exhausted = self.state.exhausted.wrapping_add(1);
            warn!("No acknowledge after {} attempts", status.attempts());
            return CycleReport::without_delivery(CycleOutcome::Exhausted(status));
        };

        self.state.delivered = self.state.delivered.wrapping_add(1);
        info!(
            "LocalNetworkID,0x{:04X},TransmittedPayloadCRC,0x{:04X}",
            self.config.network_id.0, ack.payload_crc
        );
        info!("Packet acknowledged");

        let dataset_line = match format_dataset_line(&sample, layout, ack.ack_rssi, ack.ack_snr) {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Dataset line formatting failed: {:?}", e);
                None
            }
        };

        let uplink = match self.reporter.as_mut() {
            Some(reporter) => {
                let record = UplinkRecord::from_delivery(&sample, &ack);
                Some(reporter.report(&record).await)
            }
            None => None,
        };

        CycleReport {
            outcome: CycleOutcome::Delivered(status),
            dataset_line,
            uplink,
        }
    }
}

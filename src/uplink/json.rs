//! JSON body expected by the backend
//!
//! Fixed key set, floats with two decimals, RSSI as an integer:
//! `{"temperatura": 24.50, "humedad_relativa": 60.00, "rssi": -44, "snr": 9.00}`

use super::traits::UplinkError;
use crate::reliable::LinkAttemptResult;
use crate::sensors::SensorSample;
use core::fmt::Write;
use heapless::String;

pub const MAX_JSON_LEN: usize = 128;

/// What gets reported for one acknowledged delivery
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UplinkRecord {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub rssi: i16,
    pub snr: f32,
}

impl UplinkRecord {
    /// Pair the delivered sample with the ACK link quality
    pub fn from_delivery(sample: &SensorSample, ack: &LinkAttemptResult) -> Self {
        Self {
            temperature_c: sample.temperature_c,
            humidity_pct: sample.humidity_pct,
            rssi: ack.ack_rssi,
            snr: ack.ack_snr as f32,
        }
    }

    pub fn to_json(&self) -> Result<String<MAX_JSON_LEN>, UplinkError> {
        let mut body = String::new();
        write!(
            body,
            "{{\"temperatura\": {:.2}, \"humedad_relativa\": {:.2}, \"rssi\": {}, \"snr\": {:.2}}}",
            self.temperature_c, self.humidity_pct, self.rssi, self.snr
        )
        .map_err(|_| UplinkError::BodyTooLarge)?;
        Ok(body)
    }
}

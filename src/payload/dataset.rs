//! Machine-readable dataset lines for the serial console
//!
//! One line per acknowledged delivery, picked up by the host-side capture
//! tool: `temp_C,hum_air_pct[,soil_moisture_pct],rssi_dBm,snr_dB`.

use super::csv::{format_into, PayloadError, PayloadLayout};
use crate::sensors::SensorSample;
use core::fmt::Write;
use heapless::String;

/// Longest dataset line
pub const MAX_DATASET_LEN: usize = 64;

/// Column header printed once at startup
pub fn dataset_header(layout: PayloadLayout) -> &'static str {
    match layout {
        PayloadLayout::Climate => "temp_C,hum_air_pct,rssi_dBm,snr_dB",
        PayloadLayout::ClimateSoil => "temp_C,hum_air_pct,soil_moisture_pct,rssi_dBm,snr_dB",
    }
}

/// Format the line for a delivered sample and the ACK it got
pub fn format_dataset_line(
    sample: &SensorSample,
    layout: PayloadLayout,
    ack_rssi: i16,
    ack_snr: i8,
) -> Result<String<MAX_DATASET_LEN>, PayloadError> {
    let mut line = String::new();
    format_into(sample, layout, &mut line)?;
    write!(line, ",{},{}", ack_rssi, ack_snr).map_err(|_| PayloadError::BufferTooSmall)?;
    Ok(line)
}

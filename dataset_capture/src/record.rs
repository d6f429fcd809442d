//! Dataset line parsing and CSV rows.

use std::fmt;

/// Header written once at the top of an empty output file.
pub const CSV_HEADER: &str = "timestamp_iso,temp_C,hum_aire_pct,hum_tierra_pct,rssi_dBm,snr_dB,label";

/// Fields in a sensor node dataset line.
const DATASET_FIELDS: usize = 5;

/// Why a console line was not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty after trimming
    Blank,
    /// Not five comma separated fields (log output, the header line)
    FieldCount(usize),
    /// A field is not a number
    NotNumeric(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blank => write!(f, "blank line"),
            SkipReason::FieldCount(n) => write!(f, "{} fields, expected {}", n, DATASET_FIELDS),
            SkipReason::NotNumeric(field) => write!(f, "not a number: {:?}", field),
        }
    }
}

/// One measurement as printed by the sensor node after an acknowledged delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetLine {
    pub temperature_c: f64,
    pub air_humidity_pct: f64,
    pub soil_moisture_pct: f64,
    pub rssi_dbm: f64,
    pub snr_db: f64,
}

impl DatasetLine {
    /// Parse `temp,hum_air,hum_soil,rssi,snr`.
    pub fn parse(line: &str) -> Result<Self, SkipReason> {
        let line = line.trim();
        if line.is_empty() {
            return Err(SkipReason::Blank);
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != DATASET_FIELDS {
            return Err(SkipReason::FieldCount(fields.len()));
        }

        let mut values = [0.0f64; DATASET_FIELDS];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| SkipReason::NotNumeric(field.to_string()))?;
        }

        Ok(Self {
            temperature_c: values[0],
            air_humidity_pct: values[1],
            soil_moisture_pct: values[2],
            rssi_dbm: values[3],
            snr_db: values[4],
        })
    }

    /// CSV row with the capture timestamp and label prepended/appended.
    pub fn to_csv_row(&self, timestamp_iso: &str, label: u8) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            timestamp_iso,
            self.temperature_c,
            self.air_humidity_pct,
            self.soil_moisture_pct,
            self.rssi_dbm,
            self.snr_db,
            label
        )
    }
}

//! Fixed-order CSV payload
//!
//! `temperature,humidity[,soil_moisture]`, two decimals on the floats and
//! a plain integer soil percentage, e.g. `24.50,60.00,37`.

use crate::config::protocol::MAX_CSV_LEN;
use crate::sensors::SensorSample;
use core::fmt::Write;
use heapless::String;

/// Which fields the payload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    /// `temperature,humidity`
    Climate,
    /// `temperature,humidity,soil_moisture`
    ClimateSoil,
}

impl PayloadLayout {
    pub fn field_count(&self) -> usize {
        match self {
            PayloadLayout::Climate => 2,
            PayloadLayout::ClimateSoil => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Output buffer too small for the formatted text
    BufferTooSmall,
    /// Layout wants soil moisture but the sample has none
    MissingSoil,
    /// Received payload is not UTF-8
    NotText,
    /// Received payload has the wrong number of fields
    FieldCount,
    /// A field did not parse as a number
    InvalidNumber,
}

/// Format `sample` into `out`, replacing its contents
pub fn format_into<const N: usize>(
    sample: &SensorSample,
    layout: PayloadLayout,
    out: &mut String<N>,
) -> Result<(), PayloadError> {
    out.clear();
    write!(out, "{:.2},{:.2}", sample.temperature_c, sample.humidity_pct)
        .map_err(|_| PayloadError::BufferTooSmall)?;

    if layout == PayloadLayout::ClimateSoil {
        let soil = sample.soil_moisture_pct.ok_or(PayloadError::MissingSoil)?;
        write!(out, ",{}", soil).map_err(|_| PayloadError::BufferTooSmall)?;
    }

    Ok(())
}

/// Format `sample` as the radio payload
pub fn format_payload(
    sample: &SensorSample,
    layout: PayloadLayout,
) -> Result<String<MAX_CSV_LEN>, PayloadError> {
    let mut out = String::new();
    format_into(sample, layout, &mut out)?;
    Ok(out)
}

/// Parse a received payload back into a sample
pub fn parse_payload(data: &[u8], layout: PayloadLayout) -> Result<SensorSample, PayloadError> {
    let text = core::str::from_utf8(data).map_err(|_| PayloadError::NotText)?;
    let text = text.trim();

    if text.split(',').count() != layout.field_count() {
        return Err(PayloadError::FieldCount);
    }

    let mut fields = text.split(',').map(str::trim);
    let mut next_f32 = || -> Result<f32, PayloadError> {
        fields
            .next()
            .ok_or(PayloadError::FieldCount)?
            .parse::<f32>()
            .map_err(|_| PayloadError::InvalidNumber)
    };

    let temperature_c = next_f32()?;
    let humidity_pct = next_f32()?;

    let soil_moisture_pct = match layout {
        PayloadLayout::Climate => None,
        PayloadLayout::ClimateSoil => Some(
            fields
                .next()
                .ok_or(PayloadError::FieldCount)?
                .parse::<u8>()
                .map_err(|_| PayloadError::InvalidNumber)?,
        ),
    };

    Ok(SensorSample {
        temperature_c,
        humidity_pct,
        soil_moisture_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(soil: Option<u8>) -> SensorSample {
        SensorSample {
            temperature_c: 24.5,
            humidity_pct: 60.0,
            soil_moisture_pct: soil,
        }
    }

    #[test]
    fn test_format_with_soil() {
        let text = format_payload(&sample(Some(37)), PayloadLayout::ClimateSoil).unwrap();
        assert_eq!(text.as_str(), "24.50,60.00,37");
    }

    #[test]
    fn test_format_climate_only() {
        let text = format_payload(&sample(Some(37)), PayloadLayout::Climate).unwrap();
        assert_eq!(text.as_str(), "24.50,60.00");
    }

    #[test]
    fn test_field_count_and_decimals() {
        let s = SensorSample {
            temperature_c: -3.14159,
            humidity_pct: 99.999,
            soil_moisture_pct: Some(100),
        };
        for layout in [PayloadLayout::Climate, PayloadLayout::ClimateSoil] {
            let text = format_payload(&s, layout).unwrap();
            let fields: heapless::Vec<&str, 4> = text.split(',').collect();
            assert_eq!(fields.len(), layout.field_count());
            for float in &fields[..2] {
                let (_, decimals) = float.split_once('.').expect("Should have decimals");
                assert_eq!(decimals.len(), 2);
            }
        }
    }

    #[test]
    fn test_missing_soil() {
        assert_eq!(
            format_payload(&sample(None), PayloadLayout::ClimateSoil),
            Err(PayloadError::MissingSoil)
        );
    }

    #[test]
    fn test_buffer_too_small() {
        let mut out: String<8> = String::new();
        assert_eq!(
            format_into(&sample(Some(37)), PayloadLayout::ClimateSoil, &mut out),
            Err(PayloadError::BufferTooSmall)
        );
    }

    #[test]
    fn test_parse_payload() {
        let parsed = parse_payload(b"24.50,60.00,37", PayloadLayout::ClimateSoil).unwrap();
        assert_eq!(parsed, sample(Some(37)));

        let parsed = parse_payload(b"24.50,60.00", PayloadLayout::Climate).unwrap();
        assert_eq!(parsed, sample(None));
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert_eq!(
            parse_payload(b"24.50,60.00", PayloadLayout::ClimateSoil),
            Err(PayloadError::FieldCount)
        );
        assert_eq!(
            parse_payload(b"24.50,abc,37", PayloadLayout::ClimateSoil),
            Err(PayloadError::InvalidNumber)
        );
        assert_eq!(
            parse_payload(&[0xFF, 0xFE], PayloadLayout::Climate),
            Err(PayloadError::NotText)
        );
        assert_eq!(
            parse_payload(b"hello", PayloadLayout::Climate),
            Err(PayloadError::FieldCount)
        );
    }
}

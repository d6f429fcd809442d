//! Serial capture loop.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::controls::Controls;
use crate::record::{DatasetLine, CSV_HEADER};

/// Counters printed when the capture ends.
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub recorded: u64,
    pub skipped: u64,
    /// Dataset lines dropped while paused
    pub paused: u64,
}

/// Open `path` for appending, writing the header if the file is empty.
pub fn open_output(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open {}", path.display()))?;

    if file.metadata()?.len() == 0 {
        writeln!(file, "{}", CSV_HEADER)?;
        file.flush()?;
    }

    Ok(file)
}

/// Read lines from the port and append valid dataset lines to `output`.
///
/// Each row takes the label current in `controls`. Stops after `limit`
/// recorded rows, on a quit command, or when the port fails.
pub fn run(
    port_name: &str,
    baud: u32,
    output: &mut File,
    controls: &Controls,
    limit: Option<u64>,
    verbose: bool,
) -> Result<CaptureStats> {
    let port = serialport::new(port_name, baud)
        .timeout(Duration::from_secs(1))
        .open()
        .with_context(|| format!("Cannot open serial port {}", port_name))?;

    let mut reader = BufReader::new(port);
    let mut stats = CaptureStats::default();
    let mut raw = Vec::new();

    loop {
        if controls.should_quit() || limit.is_some_and(|limit| stats.recorded >= limit) {
            return Ok(stats);
        }

        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e.into()),
        }

        let text = String::from_utf8_lossy(&raw);
        match DatasetLine::parse(&text) {
            Ok(_) if controls.is_paused() => {
                stats.paused += 1;
            }
            Ok(line) => {
                let label = controls.label();
                let timestamp = chrono::Local::now()
                    .format("%Y-%m-%dT%H:%M:%S%.6f")
                    .to_string();
                writeln!(output, "{}", line.to_csv_row(&timestamp, label))?;
                output.flush()?;
                stats.recorded += 1;

                println!(
                    "{} {} C  {} %RH  soil {} %  RSSI {} dBm  SNR {} dB  label={}",
                    timestamp.dimmed(),
                    line.temperature_c,
                    line.air_humidity_pct,
                    line.soil_moisture_pct,
                    line.rssi_dbm,
                    line.snr_db,
                    label
                );
            }
            Err(reason) => {
                stats.skipped += 1;
                if verbose {
                    println!("{} {} ({})", "skip".yellow(), text.trim(), reason);
                }
            }
        }
    }
}

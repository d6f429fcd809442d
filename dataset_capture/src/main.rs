//! Dataset capture for the sensor node.
//!
//! Records the dataset lines the node prints after every acknowledged
//! delivery into a labelled CSV file.

mod capture;
mod controls;
mod record;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;

#[derive(Parser)]
#[command(name = "dataset-capture")]
#[command(about = "Record sensor node dataset lines into a labelled CSV")]
struct Args {
    /// Serial port of the sensor node
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// CSV file to append to
    #[arg(short, long, default_value = "mediciones_lora.csv")]
    output: PathBuf,

    /// Initial binary label; type `l` and Enter to flip it during the run
    #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=1))]
    label: u8,

    /// Stop after this many rows
    #[arg(short = 'n', long)]
    limit: Option<u64>,

    /// Start paused; type `s` and Enter to begin recording
    #[arg(long)]
    wait: bool,

    /// Print lines that are not dataset lines
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "SIESPRO Dataset Capture".bold());
    println!("Port:   {}", args.port);
    println!("Baud:   {}", args.baud);
    println!("Output: {}", args.output.display());
    println!("Label:  {}", args.label);
    println!("Commands: s=start p=pause l=toggle label q=quit (then Enter)");
    println!();

    let controls = Arc::new(controls::Controls::new(args.label, args.wait));
    controls::spawn_stdin_reader(Arc::clone(&controls));

    let mut output = capture::open_output(&args.output)?;
    let stats = capture::run(
        &args.port,
        args.baud,
        &mut output,
        &controls,
        args.limit,
        args.verbose,
    )?;

    println!(
        "\n{} {} rows recorded, {} lines skipped, {} dropped while paused",
        "Done.".green(),
        stats.recorded,
        stats.skipped,
        stats.paused
    );

    Ok(())
}

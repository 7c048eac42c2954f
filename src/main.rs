extern crate ac_runtime;

use ac_runtime::core::units::format_clock_duration;
use ac_runtime::input::{discover_room_files, ingest_settings, AnalysisSettings};
use ac_runtime::output::{FileOutput, SinkOutput};
use ac_runtime::{run_analysis, RunResults};
use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct AnalysisArgs {
    /// Directory containing one `<Room>_data.csv` file per room
    data_dir: String,
    /// JSON settings file; the flags below override its values
    #[arg(long)]
    settings: Option<String>,
    /// Temperature drop per sampling interval that counts as cooling, in degrees (negative)
    #[arg(long)]
    drop_threshold: Option<f64>,
    /// Temperature rise per sampling interval that counts as warming back up, in degrees (positive)
    #[arg(long)]
    rise_threshold: Option<f64>,
    /// Cumulative minutes a rate must hold before the AC state flips
    #[arg(long)]
    sustain_minutes: Option<f64>,
    /// Power drawn by a running unit, in kW
    #[arg(long)]
    power_rate: Option<f64>,
    /// Also explore a range of sustain durations
    #[arg(long, default_value_t = false)]
    sweep: bool,
    /// Directory to write CSV reports into; stdout tables only if omitted
    #[arg(long, short)]
    report_dir: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to install tracing subscriber")?;

    let args = AnalysisArgs::parse();

    let mut settings = match &args.settings {
        Some(path) => ingest_settings(BufReader::new(
            File::open(path).with_context(|| format!("could not open settings file {path}"))?,
        ))?,
        None => AnalysisSettings::default(),
    };
    if let Some(drop_threshold) = args.drop_threshold {
        settings.detection.drop_rate_threshold = drop_threshold;
    }
    if let Some(rise_threshold) = args.rise_threshold {
        settings.detection.rise_rate_threshold = rise_threshold;
    }
    if let Some(sustain_minutes) = args.sustain_minutes {
        settings.detection.sustain_minutes = sustain_minutes;
    }
    if let Some(power_rate) = args.power_rate {
        settings.power_consumption_rate_kw = power_rate;
    }

    let room_files = discover_room_files(Path::new(&args.data_dir))?;
    let mut rooms = Vec::new();
    for (room_id, path) in room_files {
        match File::open(&path) {
            Ok(file) => rooms.push((room_id, BufReader::new(file))),
            Err(error) => warn!("skipping room {room_id}: could not open {path:?}: {error}"),
        }
    }

    let results = match &args.report_dir {
        Some(report_dir) => run_analysis(
            rooms,
            &settings,
            FileOutput::new(
                PathBuf::from(report_dir),
                "{}_runtime_results.csv".to_owned(),
            ),
            args.sweep,
        )?,
        None => run_analysis(rooms, &settings, SinkOutput, args.sweep)?,
    };

    print_report(&results, &settings);

    Ok(())
}

fn print_report(results: &RunResults, settings: &AnalysisSettings) {
    for (room_id, result) in &results.rooms {
        let (period_start, period_end) = result.period();
        println!(
            "Total time AC was running in {room_id}: {}",
            format_clock_duration(result.total_runtime())
        );
        println!(
            "Total energy consumed by AC in {room_id}: {:.2} kWh",
            result.energy_kwh(settings.power_consumption_rate_kw)
        );
        println!("Time period covered by {room_id} data: {period_start} to {period_end}\n");
    }

    let summary = &results.summary;
    println!(
        "Total time AC was running in all rooms: {}",
        format_clock_duration(summary.total_runtime)
    );
    println!(
        "Total energy consumed by AC in all rooms: {:.2} kWh",
        summary.energy_kwh
    );
    println!(
        "Time period covered by all rooms data: {} to {}",
        summary.period.0, summary.period.1
    );
    if let Some(average) = summary.average_runtime_per_day {
        println!(
            "Average AC runtime per day over {} days: {}",
            summary.day_count,
            format_clock_duration(average)
        );
    }

    if let Some(sweep) = &results.sweep {
        println!("\nSustain duration sweep:");
        println!("{:>10} {:>10} {:>10}", "[mins]", "[HH:MM]", "[kWh]");
        for point in sweep {
            println!(
                "{:>10.1} {:>10} {:>10.2}",
                point.sustain.num_seconds() as f64 / 60.,
                format_clock_duration(point.total_runtime),
                point.energy_kwh
            );
        }
    }

    if !results.skipped_rooms.is_empty() {
        println!();
        for skipped in &results.skipped_rooms {
            println!("Skipped room {}: {}", skipped.room_id, skipped.reason);
        }
    }
}

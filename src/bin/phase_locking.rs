/// phase_locking: envelope/EEG phase-locking values from the band arrays.
///
/// Output files (in `output_folder`):
///   {array_filename}   plv [participant, band, stimulus, channel] + labels
///   {csv_filename}     long table, one row per non-missing value
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use speechtrack::config::{load_yaml, TrackingConfig};
use speechtrack::tracking::{phase_locking, save_tracking};

#[derive(Parser)]
#[command(name = "phase_locking", about = "Phase-locking values per participant, band, stimulus and channel")]
struct Args {
    /// YAML config (tracking stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Band array folder (overrides `bands_folder`)
    #[arg(long)]
    bands_folder: Option<PathBuf>,

    /// Output folder (overrides `output_folder`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: TrackingConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => TrackingConfig::default(),
    };
    if let Some(dir) = args.bands_folder {
        cfg.bands_folder = dir;
    }
    if let Some(dir) = args.output {
        cfg.output_folder = dir;
    }

    let tensor = phase_locking(&cfg)?;
    let filled = tensor.data.iter().filter(|v| !v.is_nan()).count();
    info!("PLV tensor {:?}, {filled} values", tensor.data.dim());
    save_tracking(&cfg, &tensor)?;
    Ok(())
}

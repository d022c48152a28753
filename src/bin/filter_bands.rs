/// filter_bands: write `{participant}_{band}.safetensors` band phase arrays
/// (envelope phase stacked on EEG phase) for every participant and band.
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use speechtrack::config::{load_yaml, TrackingConfig};
use speechtrack::tracking::band_arrays;

#[derive(Parser)]
#[command(name = "filter_bands", about = "Envelope and EEG phase per frequency band")]
struct Args {
    /// YAML config (tracking stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of participants (overrides `no_participants`)
    #[arg(long)]
    participants: Option<usize>,

    /// Bands to process, comma-separated (default: all configured bands)
    #[arg(long, default_value = "")]
    bands: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: TrackingConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => TrackingConfig::default(),
    };
    if let Some(n) = args.participants {
        cfg.no_participants = n;
    }
    if !args.bands.is_empty() {
        let wanted: Vec<&str> = args.bands.split(',').map(str::trim).collect();
        for name in &wanted {
            cfg.band(name).with_context(|| format!("unknown band `{name}`"))?;
        }
        cfg.frequency_bands.retain(|b| wanted.contains(&b.name.as_str()));
    }

    info!(
        "{} participants × {} bands → {}",
        cfg.no_participants,
        cfg.frequency_bands.len(),
        cfg.bands_folder.display()
    );
    band_arrays(&cfg)?;
    info!("Done");
    Ok(())
}

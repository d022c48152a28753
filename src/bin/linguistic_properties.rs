/// linguistic_properties: speech duration and phrase / word / syllable /
/// phone rates of every stimulus in the sentence list.
///
/// Output file (in `output_folder`):
///   {properties.filename}   file, duration, phrase_rate, word_rate, syllable_rate, phone_rate
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use speechtrack::config::{load_yaml, SpectrumConfig};
use speechtrack::properties::{linguistic_properties, mean_duration, save_properties};

#[derive(Parser)]
#[command(name = "linguistic_properties", about = "Durations and linguistic rates of the stimuli")]
struct Args {
    /// YAML config (modulation-spectrum stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder of TextGrid alignments (overrides `properties.textgrid_folder`)
    #[arg(long)]
    textgrids: Option<PathBuf>,

    /// Output folder (overrides `output_folder`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: SpectrumConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => SpectrumConfig::default(),
    };
    if let Some(dir) = args.textgrids {
        cfg.properties.textgrid_folder = dir;
    }
    if let Some(dir) = args.output {
        cfg.output_folder = dir;
    }
    cfg.validate()?;

    let rows = linguistic_properties(&cfg)?;
    let path = save_properties(&cfg, &rows)?;
    info!("{} stimuli, mean speech duration {:.3} s → {}", rows.len(), mean_duration(&rows)?, path.display());
    Ok(())
}

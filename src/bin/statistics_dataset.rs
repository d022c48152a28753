/// statistics_dataset: merge the PLV table, the ERP tables, the participant
/// sheet and the behavioural logs into the datasets used for statistics.
///
/// Output files (in `data_folder`):
///   {csv_filename}    one row per trial × band × clustered channel
///   {AEP_filename}    AEP table with participant columns
///   {N400_filename}   N400 table with participant columns
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use speechtrack::config::{load_yaml, DatasetConfig};
use speechtrack::dataset::build_datasets;

#[derive(Parser)]
#[command(name = "statistics_dataset", about = "Datasets for the statistical analysis")]
struct Args {
    /// YAML config (statistics stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of participants (overrides `no_participants`)
    #[arg(long)]
    participants: Option<usize>,

    /// Output folder (overrides `data_folder`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: DatasetConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => DatasetConfig::default(),
    };
    if let Some(n) = args.participants {
        cfg.no_participants = n;
    }
    if let Some(dir) = args.output {
        cfg.data_folder = dir;
    }
    cfg.validate()?;

    let paths = build_datasets(&cfg)?;
    info!(
        "Written → {}, {}, {}",
        paths.tracking.display(),
        paths.aep.display(),
        paths.n400.display()
    );
    Ok(())
}

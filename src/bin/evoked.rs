/// evoked: average correctly answered trials into evoked responses.
///
/// Onset-locked epochs give one response per participant; target-locked
/// epochs give one per condition (`context`, `random`).
///
///   {evoked_folder}/{onset.folder}/pNN{evoked_extension}
///   {evoked_folder}/{target.folder}/pNN{evoked_context_extension}
///   {evoked_folder}/{target.folder}/pNN{evoked_random_extension}
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

use speechtrack::config::{load_yaml, participant_ids, AnalysisParams, EvokedConfig};
use speechtrack::io::{load_epochs, save_evoked};
use speechtrack::Epochs;

#[derive(Parser)]
#[command(name = "evoked", about = "Evoked responses for the onset and target analyses")]
struct Args {
    /// YAML config (evoked stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of participants (overrides `no_participants`)
    #[arg(long)]
    participants: Option<usize>,

    /// Skip the onset analysis
    #[arg(long)]
    skip_onset: bool,

    /// Skip the target analysis
    #[arg(long)]
    skip_target: bool,
}

fn load(cfg: &EvokedConfig, analysis: &AnalysisParams, participant: &str) -> Result<Epochs> {
    let epochs_path = cfg
        .preprocessed_folder
        .join(&analysis.folder)
        .join(format!("{participant}{}", cfg.epochs_extension));
    let log_path = cfg.logs_folder.join(format!("{participant}{}", cfg.logs_txt_extension));
    load_epochs(&epochs_path, &log_path)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: EvokedConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => EvokedConfig::default(),
    };
    if let Some(n) = args.participants {
        cfg.no_participants = n;
    }
    cfg.validate()?;
    let participants = participant_ids(cfg.no_participants);

    if !args.skip_onset {
        let analysis = &cfg.onset;
        info!("Evoked responses for onset analysis");
        let out_dir = cfg.evoked_folder.join(&analysis.folder);
        std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
        for p in &participants {
            let epochs = load(&cfg, analysis, p)?;
            let evoked = epochs
                .evoked_response(cfg.final_frequencies, &cfg.iir, analysis.evoked_limits)
                .with_context(|| format!("participant {p}, onset analysis"))?;
            debug!("{p}: {} of {} trials averaged", evoked.nave(), epochs.n_trials());
            save_evoked(&out_dir.join(format!("{p}{}", cfg.evoked_extension)), &evoked)?;
        }
    }

    if !args.skip_target {
        let analysis = &cfg.target;
        info!("Evoked responses for target analysis");
        let out_dir = cfg.evoked_folder.join(&analysis.folder);
        std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
        let conditions = ["context", "random"];
        let extensions = [&cfg.evoked_context_extension, &cfg.evoked_random_extension];
        for p in &participants {
            let epochs = load(&cfg, analysis, p)?;
            let evoked = epochs
                .evoked_by_condition(&conditions, cfg.final_frequencies, &cfg.iir, analysis.evoked_limits)
                .with_context(|| format!("participant {p}, target analysis"))?;
            for ((condition, extension), ev) in conditions.iter().zip(extensions).zip(&evoked) {
                debug!("{p} {condition}: {} trials averaged", ev.nave());
                save_evoked(&out_dir.join(format!("{p}{extension}")), ev)?;
            }
        }
    }

    info!("Written → {}", cfg.evoked_folder.display());
    Ok(())
}

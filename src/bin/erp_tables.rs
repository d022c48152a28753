/// erp_tables: AEP (P1/N1/P2) and N400 latency/amplitude tables from the
/// evoked responses.
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use speechtrack::config::{load_yaml, participant_ids, ErpConfig};
use speechtrack::erp::{aep_row, n400_row, write_aep_csv, write_n400_csv, AepRow, N400Row};
use speechtrack::io::load_evoked;

#[derive(Parser)]
#[command(name = "erp_tables", about = "AEP and N400 measures per participant")]
struct Args {
    /// YAML config (ERP stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of participants (overrides `no_participants`)
    #[arg(long)]
    participants: Option<usize>,

    /// Output folder (overrides `output_folder`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: ErpConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => ErpConfig::default(),
    };
    if let Some(n) = args.participants {
        cfg.no_participants = n;
    }
    if let Some(dir) = args.output {
        cfg.output_folder = dir;
    }
    cfg.validate()?;
    let participants = participant_ids(cfg.no_participants);
    std::fs::create_dir_all(&cfg.output_folder)
        .with_context(|| format!("creating {}", cfg.output_folder.display()))?;

    // AEP
    let aep = &cfg.aep;
    let aep_dir = cfg.evoked_folder.join(&aep.subfolder);
    let aep_rows: Vec<AepRow> = participants
        .iter()
        .map(|p| {
            let evoked = load_evoked(&aep_dir.join(format!("{p}{}", aep.file_extension)))?;
            aep_row(p, &evoked, aep).with_context(|| format!("participant {p}, AEP"))
        })
        .collect::<Result<_>>()?;
    let aep_path = cfg.output_folder.join(&aep.dataframe_filename);
    let file = File::create(&aep_path).with_context(|| format!("creating {}", aep_path.display()))?;
    write_aep_csv(BufWriter::new(file), &aep.dataframe_columns, &aep_rows)?;
    info!("AEP: {} participants → {}", aep_rows.len(), aep_path.display());

    // N400
    let n400 = &cfg.n400;
    let n400_dir = cfg.evoked_folder.join(&n400.subfolder);
    let n400_rows: Vec<N400Row> = participants
        .iter()
        .map(|p| {
            let random = load_evoked(&n400_dir.join(format!("{p}{}", n400.random_file_extension)))?;
            let context = load_evoked(&n400_dir.join(format!("{p}{}", n400.context_file_extension)))?;
            n400_row(p, &random, &context, n400).with_context(|| format!("participant {p}, N400"))
        })
        .collect::<Result<_>>()?;
    let n400_path = cfg.output_folder.join(&n400.dataframe_filename);
    let file = File::create(&n400_path).with_context(|| format!("creating {}", n400_path.display()))?;
    write_n400_csv(BufWriter::new(file), &n400_rows)?;
    info!("N400: {} participants → {}", n400_rows.len(), n400_path.display());

    Ok(())
}

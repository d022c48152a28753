/// cut_stimuli: trim raw stereo stimuli at their trigger cue and write the
/// speech channel as 16-bit mono PCM.
///
/// `sentence012_70dB.wav` (speech + trigger) → `sentence012.wav` (speech
/// from the first trigger sample on).
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

use speechtrack::config::{load_yaml, SpectrumConfig};
use speechtrack::io::{list_wavs, read_wav, stem, write_wav_i16};
use speechtrack::waveform::cut_name;

#[derive(Parser)]
#[command(name = "cut_stimuli", about = "Trim raw stimuli at their trigger cue")]
struct Args {
    /// YAML config (modulation-spectrum stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder of raw stereo wavs (overrides `raw_stimuli_folder`)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output folder (overrides `stimuli_folder`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg: SpectrumConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => SpectrumConfig::default(),
    };
    let input = args.input.unwrap_or(cfg.raw_stimuli_folder);
    let output = args.output.unwrap_or(cfg.stimuli_folder);
    std::fs::create_dir_all(&output).with_context(|| format!("creating {}", output.display()))?;

    let files = list_wavs(&input)?;
    info!("{} raw stimuli in {}", files.len(), input.display());

    for path in &files {
        let name = stem(path)?;
        let id = cut_name(&name).with_context(|| format!("naming {}", path.display()))?;

        let trimmed = read_wav(path)?
            .cut_from_cue()
            .with_context(|| format!("trimming stimulus `{name}`"))?;
        let out = output.join(format!("{id}.wav"));
        write_wav_i16(&out, &trimmed)?;
        debug!("{name} → {} ({:.3} s)", out.display(), trimmed.duration());
    }

    info!("Written {} stimuli → {}", files.len(), output.display());
    Ok(())
}

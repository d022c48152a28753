/// modulation_spectrum: corpus modulation spectrum of the trimmed stimuli.
///
/// Output files (in `output_folder`):
///   {spectrum_filename}.safetensors   freqs [F], spectrum [F], mean_samples [1]
///   {spectrum_filename}.csv           frequency_hz, amplitude
///   envelopes.safetensors             [stimulus, mean_samples]  (--envelopes only)
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use speechtrack::config::{load_yaml, SpectrumConfig};
use speechtrack::io::{list_wavs, read_wav, stem, StWriter};
use speechtrack::modulation::{compute_envelopes, compute_modulation_spectrum, reference_length};
use speechtrack::properties::reference_duration;
use speechtrack::Waveform;

#[derive(Parser)]
#[command(name = "modulation_spectrum", about = "Modulation spectrum of a stimulus corpus")]
struct Args {
    /// YAML config (modulation-spectrum stage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stimulus folder (overrides `stimuli_folder`)
    #[arg(long)]
    stimuli: Option<PathBuf>,

    /// Output folder (overrides `output_folder`)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write the broadband envelope of every stimulus
    #[arg(long)]
    envelopes: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: SpectrumConfig = match &args.config {
        Some(path) => load_yaml(path)?,
        None => SpectrumConfig::default(),
    };
    if let Some(dir) = args.stimuli {
        cfg.stimuli_folder = dir;
    }
    if let Some(dir) = args.output {
        cfg.output_folder = dir;
    }
    cfg.validate()?;

    let files = list_wavs(&cfg.stimuli_folder)?;
    let ids: Vec<String> = files.iter().map(|p| stem(p)).collect::<Result<_>>()?;
    let stimuli: Vec<Waveform> = files.iter().map(|p| read_wav(p)).collect::<Result<_>>()?;
    info!("Loaded {} stimuli from {}", stimuli.len(), cfg.stimuli_folder.display());

    let cfs = cfg.gammatone.center_freqs()?;
    // Fixed duration, else the properties table when configured, else mean file length.
    let duration = reference_duration(&cfg)?;
    let mean_samples = reference_length(&stimuli, cfg.sfreq, duration)?;
    info!(
        "{} gammatone bands, reference length {} samples ({:.3} s)",
        cfs.len(),
        mean_samples,
        mean_samples as f64 / cfg.sfreq
    );

    let ms = compute_modulation_spectrum(&stimuli, &cfs, cfg.sfreq, mean_samples, cfg.compression, cfg.spectrum_limits)?;

    std::fs::create_dir_all(&cfg.output_folder)
        .with_context(|| format!("creating {}", cfg.output_folder.display()))?;
    let mut w = StWriter::new();
    w.add_f64("freqs", &ms.freqs, &[ms.freqs.len()]);
    w.add_f64("spectrum", &ms.spectrum, &[ms.spectrum.len()]);
    w.add_scalar("mean_samples", mean_samples as f64);
    w.add_metadata("compression", &cfg.compression.to_string());
    let array_path = cfg.output_folder.join(format!("{}.safetensors", cfg.spectrum_filename));
    w.write(&array_path)?;

    let csv_path = cfg.output_folder.join(format!("{}.csv", cfg.spectrum_filename));
    let file = std::fs::File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?;
    ms.write_csv(std::io::BufWriter::new(file))?;
    info!("Written → {} and {}", array_path.display(), csv_path.display());

    if args.envelopes {
        let env = compute_envelopes(&stimuli, &cfs, cfg.sfreq, mean_samples, cfg.compression)?;
        let mut w = StWriter::new();
        w.add_array("envelopes", &env);
        w.add_strings("stimuli", &ids);
        w.add_scalar("sfreq", cfg.sfreq);
        let path = cfg.output_folder.join("envelopes.safetensors");
        w.write(&path)?;
        info!("Written → {}", path.display());
    }
    Ok(())
}

//! Speech-tracking batch stages.
//!
//! ```text
//! stimuli/*.wav ─ envelope @ sfreq_eeg ─ band phase @ sfreq_goal ─┐
//!                                                                  ├─ [stimulus, 1 + channel, sample]
//! pNN epochs ─ band phase @ sfreq_goal ─ crop [0, mean_length_s] ─┘   → {participant}_{band}.safetensors
//!                                      ─ reorder to sorted stimulus ids
//!
//! band arrays ─ PLV(envelope row, each EEG row) ─ [participant, band, stimulus, channel]
//! ```
//!
//! Envelopes and envelope phases are fitted to `mean_length_samples` so every
//! stimulus row has the same length as the cropped EEG.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use ndarray::{s, Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;

use crate::align::reorder_trials;
use crate::config::{FrequencyBand, TrackingConfig};
use crate::connectivity::{band_plv, TrackingTensor};
use crate::envelope::{extract_envelope, fit_length};
use crate::epoch::Epochs;
use crate::error::{self, Error};
use crate::io::{list_wavs_recursive, load_epochs, read_safetensors, read_wav, stem, StWriter};
use crate::phase::{extract_eeg_phase, extract_phase};
use crate::waveform::Waveform;

// ── Band arrays ───────────────────────────────────────────────────────────────

/// Envelope phase (row 0) stacked with EEG phase for every stimulus:
/// `[stimulus, 1 + channel, sample]`.
#[derive(Debug, Clone)]
pub struct BandArray {
    pub data: Array3<f64>,
    /// Stimulus ids in sorted order, one per entry of axis 0.
    pub stimuli: Vec<String>,
    /// EEG channel names, one per row after the envelope.
    pub ch_names: Vec<String>,
    pub band: FrequencyBand,
    pub sfreq: f64,
}

impl BandArray {
    /// Stack `envelope_phase [stimulus, sample]` on top of
    /// `eeg_phase [stimulus, channel, sample']`, fitting the EEG to the
    /// envelope length.
    ///
    /// # Errors
    ///
    /// [`Error::Alignment`] if the stimulus counts differ.
    pub fn assemble(
        envelope_phase: &Array2<f64>,
        eeg_phase: &Array3<f64>,
        stimuli: Vec<String>,
        ch_names: Vec<String>,
        band: FrequencyBand,
        sfreq: f64,
    ) -> error::Result<Self> {
        let (n_stim, n_samples) = envelope_phase.dim();
        let (n_trials, n_ch, _) = eeg_phase.dim();
        if n_trials != n_stim || stimuli.len() != n_stim {
            return Err(Error::alignment(format!(
                "{n_stim} stimulus envelopes, {} stimulus ids, {n_trials} EEG trials",
                stimuli.len()
            )));
        }
        let mut data = Array3::zeros((n_stim, n_ch + 1, n_samples));
        data.slice_mut(s![.., 0, ..]).assign(envelope_phase);
        for (i, trial) in eeg_phase.axis_iter(Axis(0)).enumerate() {
            for (c, row) in trial.rows().into_iter().enumerate() {
                let fitted = fit_length(&row.to_vec(), n_samples);
                data.slice_mut(s![i, c + 1, ..]).assign(&ArrayView1::from(&fitted));
            }
        }
        Ok(Self { data, stimuli, ch_names, band, sfreq })
    }

    /// `[stimulus, channel]` phase-locking values.
    pub fn plv(&self) -> error::Result<Array2<f64>> {
        band_plv(&self.data)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_array("data", &self.data);
        w.add_scalar("sfreq", self.sfreq);
        w.add_strings("stimuli", &self.stimuli);
        w.add_strings("ch_names", &self.ch_names);
        w.add_metadata("band", &self.band.name);
        w.add_metadata("fmin", &self.band.fmin.to_string());
        w.add_metadata("fmax", &self.band.fmax.to_string());
        w.add_metadata("n_cycles", &self.band.n_cycles.to_string());
        w.write(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let st = read_safetensors(path)?;
        let meta = st.metadata();
        let num = |key: &str| -> Result<f64> {
            meta.get(key)
                .with_context(|| format!("{}: no `{key}` metadata", path.display()))?
                .parse()
                .with_context(|| format!("{}: bad `{key}` metadata", path.display()))
        };
        let band = FrequencyBand::new(
            meta.get("band").map_or("", String::as_str),
            num("fmin")?,
            num("fmax")?,
            num("n_cycles")?,
        );
        Ok(Self {
            data: st.tensor_as::<ndarray::Ix3>("data")?,
            stimuli: st.strings("stimuli")?,
            ch_names: st.strings("ch_names")?,
            band,
            sfreq: st.scalar("sfreq")?,
        })
    }
}

/// Output path of one participant's band array.
pub fn band_array_path(folder: &Path, participant: &str, band: &str) -> PathBuf {
    folder.join(format!("{participant}_{band}.safetensors"))
}

/// Broadband envelope of every stimulus at the EEG rate.
pub fn stimulus_envelopes(stimuli: &[Waveform], ids: &[String], cfg: &TrackingConfig) -> Result<Vec<Vec<f64>>> {
    let cfs = cfg.gammatone.center_freqs()?;
    stimuli
        .par_iter()
        .zip(ids)
        .map(|(w, id)| {
            extract_envelope(w, &cfs, cfg.compression, cfg.sfreq_eeg, &cfg.iir)
                .with_context(|| format!("envelope of stimulus `{id}`"))
        })
        .collect()
}

/// Band phase of every envelope at `sfreq_goal`, fitted to
/// `mean_length_samples`.  Returns `[stimulus, sample]`.
pub fn envelope_phases(envelopes: &[Vec<f64>], ids: &[String], cfg: &TrackingConfig, band: &FrequencyBand) -> Result<Array2<f64>> {
    let n = cfg.mean_length_samples();
    let rows: Vec<Vec<f64>> = envelopes
        .par_iter()
        .zip(ids)
        .map(|(env, id)| {
            let phase = extract_phase(env, cfg.sfreq_eeg, cfg.sfreq_goal, band.fmin, band.fmax, &cfg.iir)
                .with_context(|| format!("envelope phase of `{id}` in band `{}`", band.name))?;
            Ok(fit_length(&phase, n))
        })
        .collect::<Result<_>>()?;
    Ok(Array2::from_shape_vec((rows.len(), n), rows.concat())?)
}

/// One participant's band array.
///
/// The EEG trials are reordered from presentation order into sorted stimulus
/// order, which must coincide with `stimuli`.
pub fn participant_band_array(
    epochs: &Epochs,
    envelope_phase: &Array2<f64>,
    stimuli: &[String],
    cfg: &TrackingConfig,
    band: &FrequencyBand,
) -> error::Result<BandArray> {
    let order = epochs.stimulus_ids();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    if sorted != stimuli {
        return Err(Error::alignment(
            "presented stimulus ids do not match the stimulus folder".to_string(),
        ));
    }
    let eeg = extract_eeg_phase(epochs, cfg.sfreq_goal, band.fmin, band.fmax, cfg.mean_length_s, &cfg.iir)?;
    let eeg = reorder_trials(&order, &eeg)?;
    BandArray::assemble(
        envelope_phase,
        &eeg,
        stimuli.to_vec(),
        epochs.ch_names().to_vec(),
        band.clone(),
        cfg.sfreq_goal,
    )
}

/// Write `{participant}_{band}.safetensors` for every participant and band.
pub fn band_arrays(cfg: &TrackingConfig) -> Result<()> {
    cfg.validate()?;
    std::fs::create_dir_all(&cfg.bands_folder)
        .with_context(|| format!("creating {}", cfg.bands_folder.display()))?;

    let wavs = list_wavs_recursive(&cfg.speech_folder)?;
    let ids: Vec<String> = wavs.iter().map(|p| stem(p)).collect::<Result<_>>()?;
    let stimuli: Vec<Waveform> = wavs.iter().map(|p| read_wav(p)).collect::<Result<_>>()?;
    for (w, id) in stimuli.iter().zip(&ids) {
        anyhow::ensure!(
            (w.sfreq() - cfg.sfreq_wav).abs() < 1e-6,
            "stimulus `{id}` is sampled at {} Hz, config expects {} Hz",
            w.sfreq(),
            cfg.sfreq_wav
        );
    }
    info!("{} stimuli in {}", stimuli.len(), cfg.speech_folder.display());

    let envelopes = stimulus_envelopes(&stimuli, &ids, cfg)?;

    for band in &cfg.frequency_bands {
        info!("Processing `{}` band ({}–{} Hz)", band.name, band.fmin, band.fmax);
        let env_phase = envelope_phases(&envelopes, &ids, cfg, band)?;

        for participant in cfg.participants() {
            let epochs_path = cfg.eeg_folder.join(format!("{participant}{}", cfg.epochs_extension));
            let log_path = cfg.logs_folder.join(format!("{participant}{}", cfg.logs_txt_extension));
            let epochs = load_epochs(&epochs_path, &log_path)?;
            debug!("{participant}: {} trials × {} channels", epochs.n_trials(), epochs.n_channels());

            let array = participant_band_array(&epochs, &env_phase, &ids, cfg, band)
                .with_context(|| format!("participant {participant}, band `{}`", band.name))?;
            let out = band_array_path(&cfg.bands_folder, &participant, &band.name);
            array.save(&out)?;
            debug!("wrote {}", out.display());
        }
    }
    Ok(())
}

// ── Phase locking ─────────────────────────────────────────────────────────────

/// Fill the cohort PLV tensor from the band arrays in `bands_folder`.
///
/// Stimulus and channel axes come from the first band array found; every
/// other file must agree.  Missing files leave NaN entries.
pub fn phase_locking(cfg: &TrackingConfig) -> Result<TrackingTensor> {
    cfg.validate()?;
    let participants = cfg.participants();
    let mut tensor: Option<TrackingTensor> = None;

    for band in &cfg.frequency_bands {
        info!("Phase locking in `{}` band (n_cycles = {})", band.name, band.n_cycles);
        for participant in &participants {
            let path = band_array_path(&cfg.bands_folder, participant, &band.name);
            if !path.exists() {
                info!("{}: missing, left as NaN", path.display());
                continue;
            }
            let array = BandArray::load(&path)?;
            let plv = array
                .plv()
                .with_context(|| format!("participant {participant}, band `{}`", band.name))?;
            let t = tensor.get_or_insert_with(|| {
                TrackingTensor::new(
                    participants.clone(),
                    cfg.frequency_bands.clone(),
                    array.stimuli.clone(),
                    array.ch_names.clone(),
                )
            });
            anyhow::ensure!(
                t.stimuli == array.stimuli && t.channels == array.ch_names,
                "{}: stimulus or channel axis differs from earlier band arrays",
                path.display()
            );
            t.set(participant, &band.name, &plv)?;
        }
    }
    tensor.with_context(|| format!("no band arrays found in {}", cfg.bands_folder.display()))
}

/// Save the tensor as a safetensors archive and a long CSV table.
pub fn save_tracking(cfg: &TrackingConfig, tensor: &TrackingTensor) -> Result<()> {
    std::fs::create_dir_all(&cfg.output_folder)
        .with_context(|| format!("creating {}", cfg.output_folder.display()))?;

    let mut w = StWriter::new();
    w.add_array("plv", &tensor.data);
    w.add_strings("participants", &tensor.participants);
    w.add_strings("bands", &tensor.bands.iter().map(|b| b.name.clone()).collect::<Vec<_>>());
    w.add_strings("stimuli", &tensor.stimuli);
    w.add_strings("channels", &tensor.channels);
    for b in &tensor.bands {
        w.add_metadata(&format!("{}.n_cycles", b.name), &b.n_cycles.to_string());
    }
    let array_path = cfg.output_folder.join(&cfg.array_filename);
    w.write(&array_path)?;

    let csv_path = cfg.output_folder.join(&cfg.csv_filename);
    let file = std::fs::File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?;
    tensor.write_long_csv(std::io::BufWriter::new(file), &cfg.csv_col_names)?;
    info!("wrote {} and {}", array_path.display(), csv_path.display());
    Ok(())
}

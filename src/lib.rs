//! # speechtrack — speech tracking and ERP analysis in pure Rust
//!
//! `speechtrack` implements the analysis pipeline of a speech-listening EEG
//! study: how strongly the cortex phase-locks to the speech envelope in
//! several rhythmic bands, the modulation spectrum of the stimulus corpus,
//! and auditory / N400 event-related potential measures.  Filtering,
//! decimation and resampling follow MNE-Python / SciPy conventions so the
//! numbers line up with the published analysis.
//!
//! ## Pipeline overview
//!
//! ```text
//! raw stereo wav ─ waveform::cut_from_cue ─ stimuli/*.wav
//!                                             │
//!        ┌────────────────────────────────────┤
//!        │                                    │
//!  modulation::compute_modulation_spectrum    envelope::extract_envelope
//!        │  gammatone → rectify^c             │  gammatone → rectify^c → mean
//!        │  |rfft|, RMS, √f, normalise        │  lowpass, resample → sfreq_eeg
//!        ▼                                    │
//!  spectrum.safetensors / .csv                phase::extract_phase (per band)
//!                                             │
//!  pNN epochs ─ phase::extract_eeg_phase ─────┤
//!               align::reorder_trials         ▼
//!                                      tracking::BandArray
//!                                             │
//!                              connectivity::band_plv
//!                                             ▼
//!                          [participant, band, stimulus, channel] PLV
//!
//!  pNN epochs ─ epoch::Epochs::{filter_band, select, apply_baseline, crop,
//!                                average} ─ Evoked
//!                                             │
//!                                erp::{aep_row, n400_row} ─ CSV tables
//!
//!  stimuli/*.wav + TextGrid alignments ─ properties::linguistic_properties
//!        │  speech duration, phrase/word/syllable/phone rates
//!        ▼
//!  stimuli_properties.csv ─ mean duration ─ modulation reference length
//!
//!  PLV long CSV + participants + trial logs ─ dataset::tracking_dataset
//!  AEP / N400 tables + participants ───────── dataset::with_participants
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use speechtrack::config::{load_yaml, TrackingConfig};
//! use speechtrack::tracking::{band_arrays, phase_locking, save_tracking};
//! use std::path::Path;
//!
//! let cfg: TrackingConfig = load_yaml(Path::new("config/tracking.yaml")).unwrap();
//! band_arrays(&cfg).unwrap();
//! let tensor = phase_locking(&cfg).unwrap();
//! save_tracking(&cfg, &tensor).unwrap();
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use speechtrack::config::IirParams;
//! use speechtrack::envelope::extract_envelope;
//! use speechtrack::gammatone::erb_space;
//! use speechtrack::phase::extract_phase;
//! use speechtrack::Waveform;
//!
//! let audio = Waveform::from_mono(vec![0.0; 44_100], 44_100.0);
//! let cfs = erb_space(100.0, 8000.0, 32).unwrap();
//! let iir = IirParams::default();
//!
//! // Broadband envelope at the EEG rate
//! let env = extract_envelope(&audio, &cfs, 0.3, 512.0, &iir).unwrap();
//!
//! // Syllable-rate phase at 128 Hz
//! let phase = extract_phase(&env, 512.0, 128.0, 3.5, 7.0, &iir).unwrap();
//! ```

pub mod align;
pub mod config;
pub mod connectivity;
pub mod dataset;
pub mod envelope;
pub mod epoch;
pub mod erp;
pub mod error;
pub mod filter;
pub mod gammatone;
pub mod hilbert;
pub mod io;
pub mod modulation;
pub mod phase;
pub mod properties;
pub mod resample;
pub mod table;
pub mod textgrid;
pub mod tracking;
pub mod waveform;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// errors
pub use error::{Error, Result};

// config
pub use config::{
    load_yaml, participant_ids, DatasetConfig, ErbSpacing, ErpConfig, EvokedConfig, FrequencyBand,
    IirParams, PropertiesParams, SpectrumConfig, SpectrumLimits, TrackingConfig,
};

// signals
pub use epoch::{Epochs, Evoked, TrialMetadata};
pub use waveform::Waveform;

// DSP
pub use envelope::extract_envelope;
pub use filter::filter_data;
pub use gammatone::GammatoneFilterbank;
pub use hilbert::instantaneous_phase;
pub use phase::{extract_eeg_phase, extract_phase};
pub use resample::{downsample, resample};

// analysis
pub use align::{canonical_permutation, reorder, reorder_trials};
pub use connectivity::{phase_locking_value, TrackingTensor};
pub use erp::{find_peak, mean_amplitude_around_peak, Polarity};
pub use modulation::{compute_modulation_spectrum, ModulationSpectrum};
pub use properties::StimulusProperties;
pub use tracking::BandArray;

// io
pub use io::{read_safetensors, StWriter};
pub use table::Table;
pub use textgrid::TextGrid;

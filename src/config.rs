//! Stage configuration.
//!
//! Each batch stage gets its own struct holding only the parameters it
//! consumes.  All structs deserialize from YAML with `#[serde(default)]`, so
//! a document only needs to list the values that differ from the defaults:
//!
//! ```
//! use speechtrack::config::TrackingConfig;
//!
//! let cfg: TrackingConfig = serde_yaml::from_str("
//! sfreq_goal: 100.0
//! no_participants: 3
//! ").unwrap();
//! assert_eq!(cfg.sfreq_eeg, 512.0);
//! assert_eq!(cfg.participants(), vec!["p01", "p02", "p03"]);
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{self, Error};
use crate::filter::IirForm;

/// Read and parse one YAML document.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Cohort identifiers `p01 ..= pNN`.
pub fn participant_ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("p{i:02}")).collect()
}

// ── Shared pieces ─────────────────────────────────────────────────────────

/// IIR filter options, the `alias_dict` of the YAML documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IirParams {
    /// Filter order of the analog prototype.  Applied forward and backward,
    /// so the effective order doubles.
    ///
    /// Default: `4`.
    pub order: usize,

    /// Filter family.  Only `"butter"` is recognised.
    pub ftype: String,

    /// Output form: `"sos"` (second-order sections) or `"ba"` (single
    /// transfer function).
    pub output: String,
}

impl Default for IirParams {
    fn default() -> Self {
        Self { order: 4, ftype: "butter".into(), output: "sos".into() }
    }
}

impl IirParams {
    /// Check the options and return the requested output form.
    pub fn form(&self) -> error::Result<IirForm> {
        if self.order == 0 {
            return Err(Error::config("IIR order must be at least 1"));
        }
        if self.ftype != "butter" {
            return Err(Error::config(format!(
                "unsupported IIR filter family `{}` (expected `butter`)",
                self.ftype
            )));
        }
        match self.output.as_str() {
            "sos" => Ok(IirForm::Sos),
            "ba" => Ok(IirForm::Ba),
            other => Err(Error::config(format!(
                "unsupported IIR output form `{other}` (expected `sos` or `ba`)"
            ))),
        }
    }
}

/// A named frequency band plus the wavelet cycle count used by downstream
/// connectivity estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub fmin: f64,
    pub fmax: f64,
    #[serde(default = "default_n_cycles")]
    pub n_cycles: f64,
}

fn default_n_cycles() -> f64 {
    7.0
}

impl FrequencyBand {
    pub fn new(name: &str, fmin: f64, fmax: f64, n_cycles: f64) -> Self {
        Self { name: name.to_string(), fmin, fmax, n_cycles }
    }

    /// `fmin < fmax`, both positive and below the Nyquist frequency of
    /// `sfreq`.
    pub fn validate(&self, sfreq: f64) -> error::Result<()> {
        check_band(self.fmin, self.fmax, sfreq)
            .map_err(|e| Error::config(format!("band `{}`: {e}", self.name)))
    }
}

pub(crate) fn check_band(fmin: f64, fmax: f64, sfreq: f64) -> std::result::Result<(), String> {
    let nyq = sfreq / 2.0;
    if !(fmin < fmax) {
        return Err(format!("freq_min ({fmin}) must be below freq_max ({fmax})"));
    }
    if fmin <= 0.0 {
        return Err(format!("freq_min ({fmin}) must be positive"));
    }
    if fmax >= nyq {
        return Err(format!("freq_max ({fmax}) must be below Nyquist ({nyq} Hz)"));
    }
    Ok(())
}

/// ERB-spaced gammatone centre frequencies, `low ..= high` with `n` bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErbSpacing {
    pub low: f64,
    pub high: f64,
    #[serde(alias = "N")]
    pub n: usize,
}

impl Default for ErbSpacing {
    fn default() -> Self {
        Self { low: 100.0, high: 8000.0, n: 32 }
    }
}

impl ErbSpacing {
    pub fn center_freqs(&self) -> error::Result<Vec<f64>> {
        crate::gammatone::erb_space(self.low, self.high, self.n)
    }

    /// Valid spacing whose highest centre frequency is below Nyquist.
    pub fn validate(&self, sfreq: f64) -> error::Result<()> {
        self.center_freqs()?;
        if self.high >= sfreq / 2.0 {
            return Err(Error::config(format!(
                "gammatone high frequency {} Hz must be below Nyquist ({} Hz)",
                self.high,
                sfreq / 2.0
            )));
        }
        Ok(())
    }
}

/// `window[0] < window[1]`.
fn check_window(what: &str, window: [f64; 2]) -> error::Result<()> {
    if !(window[0] < window[1]) {
        return Err(Error::config(format!("{what} [{}, {}] is inverted or empty", window[0], window[1])));
    }
    Ok(())
}

fn check_positive(what: &str, v: f64) -> error::Result<()> {
    if !(v > 0.0) {
        return Err(Error::config(format!("{what} must be positive, got {v}")));
    }
    Ok(())
}

// ── Speech tracking ───────────────────────────────────────────────────────

/// Parameters for the envelope/EEG phase extraction and phase-locking
/// stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Folder with `{participant}{epochs_extension}` epoch files.
    pub eeg_folder: PathBuf,
    /// Folder with the trimmed mono stimuli (`*.wav`, searched recursively).
    pub speech_folder: PathBuf,
    /// Folder with `{participant}{logs_txt_extension}` trial logs.
    pub logs_folder: PathBuf,
    /// Output folder for the per-participant, per-band phase arrays.
    pub bands_folder: PathBuf,
    /// Output folder for the phase-locking table and archive.
    pub output_folder: PathBuf,

    /// Sample rate of the stimuli.
    ///
    /// Default: `44100.0` Hz.
    pub sfreq_wav: f64,

    /// Sample rate of the preprocessed EEG.  Envelopes are first brought to
    /// this rate so both signals share the same band-pass step.
    ///
    /// Default: `512.0` Hz.
    pub sfreq_eeg: f64,

    /// Final rate of every phase signal.
    ///
    /// Default: `128.0` Hz.
    pub sfreq_goal: f64,

    pub gammatone: ErbSpacing,

    /// Exponent applied after half-wave rectification.
    ///
    /// Default: `0.3`.
    pub compression: f64,

    /// Reference duration every phase signal is padded/truncated to.
    ///
    /// Default: `2.5` s.
    pub mean_length_s: f64,

    pub iir: IirParams,
    pub frequency_bands: Vec<FrequencyBand>,

    pub no_participants: usize,
    pub epochs_extension: String,
    pub logs_txt_extension: String,

    pub csv_filename: String,
    /// Long-format column names: participant, band, stimulus, channel, value.
    pub csv_col_names: Vec<String>,
    pub array_filename: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            eeg_folder: PathBuf::from("data/epochs"),
            speech_folder: PathBuf::from("data/stimuli"),
            logs_folder: PathBuf::from("data/logs"),
            bands_folder: PathBuf::from("data/bands"),
            output_folder: PathBuf::from("results/tracking"),
            sfreq_wav: 44_100.0,
            sfreq_eeg: 512.0,
            sfreq_goal: 128.0,
            gammatone: ErbSpacing::default(),
            compression: 0.3,
            mean_length_s: 2.5,
            iir: IirParams::default(),
            frequency_bands: vec![
                FrequencyBand::new("phrase_rate", 0.6, 1.3, 2.0),
                FrequencyBand::new("word_rate", 1.3, 3.5, 7.0),
                FrequencyBand::new("syllable_rate", 3.5, 7.0, 7.0),
            ],
            no_participants: 0,
            epochs_extension: "-epo.safetensors".into(),
            logs_txt_extension: ".txt".into(),
            csv_filename: "tracking.csv".into(),
            csv_col_names: ["participant_id", "frequency_band", "stimulus_id", "channel_id", "plv"]
                .map(String::from)
                .to_vec(),
            array_filename: "tracking.safetensors".into(),
        }
    }
}

impl TrackingConfig {
    /// Number of samples in `arange(0, mean_length_s, 1 / sfreq_goal)`.
    pub fn mean_length_samples(&self) -> usize {
        (self.mean_length_s * self.sfreq_goal - 1e-9).ceil().max(0.0) as usize
    }

    pub fn participants(&self) -> Vec<String> {
        participant_ids(self.no_participants)
    }

    pub fn band(&self, name: &str) -> Option<&FrequencyBand> {
        self.frequency_bands.iter().find(|b| b.name == name)
    }

    pub fn validate(&self) -> error::Result<()> {
        if !(self.sfreq_goal > 0.0 && self.sfreq_eeg > self.sfreq_goal && self.sfreq_wav > self.sfreq_eeg) {
            return Err(Error::config(format!(
                "sample rates must decrease wav ({}) > eeg ({}) > goal ({})",
                self.sfreq_wav, self.sfreq_eeg, self.sfreq_goal
            )));
        }
        check_positive("compression exponent", self.compression)?;
        check_positive("mean_length_s", self.mean_length_s)?;
        self.gammatone.validate(self.sfreq_wav)?;
        if self.csv_col_names.len() != 5 {
            return Err(Error::config("csv_col_names needs exactly 5 names"));
        }
        self.iir.form()?;
        for band in &self.frequency_bands {
            band.validate(self.sfreq_goal)?;
        }
        Ok(())
    }
}

// ── Modulation spectrum ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumLimits {
    pub low: f64,
    pub high: f64,
}

/// Inputs of the linguistic-properties table: forced-alignment TextGrids and
/// the sentence list with syllable counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertiesParams {
    pub textgrid_folder: PathBuf,
    /// Tab-separated `file`, `sentence`, `syllables` rows without a header.
    pub sentences_file: PathBuf,
    /// Suffix of the TextGrid stems after the stimulus id (`_70dB`).
    pub textgrid_suffix: String,
    /// Tier roles in file order; must name a `word` and a `phone` tier.
    pub tier_order: Vec<String>,
    /// Phrases per sentence.
    pub n_phrases: usize,
    pub filename: String,
}

impl Default for PropertiesParams {
    fn default() -> Self {
        Self {
            textgrid_folder: PathBuf::from("data/alignment"),
            sentences_file: PathBuf::from("data/sentences.tsv"),
            textgrid_suffix: "_70dB".into(),
            tier_order: vec!["word".into(), "phone".into()],
            n_phrases: 1,
            filename: "stimuli_properties.csv".into(),
        }
    }
}

impl PropertiesParams {
    /// Position of a tier role in `tier_order`.
    pub fn tier_index(&self, role: &str) -> error::Result<usize> {
        self.tier_order
            .iter()
            .position(|t| t == role)
            .ok_or_else(|| Error::config(format!("tier_order {:?} has no `{role}` tier", self.tier_order)))
    }

    pub fn validate(&self) -> error::Result<()> {
        self.tier_index("word")?;
        self.tier_index("phone")?;
        if self.n_phrases == 0 {
            return Err(Error::config("n_phrases must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Untrimmed stereo stimuli (speech + trigger channel).
    pub raw_stimuli_folder: PathBuf,
    /// Trimmed mono stimuli.
    pub stimuli_folder: PathBuf,
    pub output_folder: PathBuf,
    pub sfreq: f64,
    pub gammatone: ErbSpacing,
    pub compression: f64,
    pub spectrum_limits: SpectrumLimits,
    /// Fixed reference duration.  Takes precedence over every other source.
    pub mean_duration_s: Option<f64>,
    /// Use the mean speech duration of the properties table (written to
    /// `output_folder`) instead of the mean file duration.
    pub duration_from_properties: bool,
    pub properties: PropertiesParams,
    pub spectrum_filename: String,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            raw_stimuli_folder: PathBuf::from("data/stimuli_raw"),
            stimuli_folder: PathBuf::from("data/stimuli"),
            output_folder: PathBuf::from("results/speech"),
            sfreq: 44_100.0,
            gammatone: ErbSpacing::default(),
            compression: 0.3,
            spectrum_limits: SpectrumLimits { low: 0.5, high: 32.0 },
            mean_duration_s: None,
            duration_from_properties: false,
            properties: PropertiesParams::default(),
            spectrum_filename: "modulation_spectrum".into(),
        }
    }
}

impl SpectrumConfig {
    pub fn properties_path(&self) -> PathBuf {
        self.output_folder.join(&self.properties.filename)
    }

    pub fn validate(&self) -> error::Result<()> {
        check_positive("sfreq", self.sfreq)?;
        check_positive("compression exponent", self.compression)?;
        self.gammatone.validate(self.sfreq)?;
        let SpectrumLimits { low, high } = self.spectrum_limits;
        check_window("spectrum_limits", [low, high])?;
        if low < 0.0 || high > self.sfreq / 2.0 {
            return Err(Error::config(format!(
                "spectrum_limits [{low}, {high}] must lie within [0, {}] Hz",
                self.sfreq / 2.0
            )));
        }
        if let Some(d) = self.mean_duration_s {
            if !((d * self.sfreq).floor() >= 1.0) {
                return Err(Error::config(format!("mean_duration_s ({d} s) is shorter than one sample")));
            }
        }
        self.properties.validate()
    }
}

// ── Evoked responses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Sub-folder shared by the epoch input and the evoked output.
    pub folder: String,
    /// `[tmin, tmax]` of the averaged response, seconds.
    pub evoked_limits: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvokedConfig {
    pub preprocessed_folder: PathBuf,
    pub logs_folder: PathBuf,
    pub evoked_folder: PathBuf,
    pub no_participants: usize,
    pub epochs_extension: String,
    pub logs_txt_extension: String,
    pub evoked_extension: String,
    pub evoked_context_extension: String,
    pub evoked_random_extension: String,
    /// Band-pass applied before averaging.
    pub final_frequencies: [f64; 2],
    pub iir: IirParams,
    pub onset: AnalysisParams,
    pub target: AnalysisParams,
}

impl Default for EvokedConfig {
    fn default() -> Self {
        Self {
            preprocessed_folder: PathBuf::from("data/preprocessed"),
            logs_folder: PathBuf::from("data/logs"),
            evoked_folder: PathBuf::from("data/evoked"),
            no_participants: 0,
            epochs_extension: "-epo.safetensors".into(),
            logs_txt_extension: ".txt".into(),
            evoked_extension: "-ave.safetensors".into(),
            evoked_context_extension: "_context-ave.safetensors".into(),
            evoked_random_extension: "_random-ave.safetensors".into(),
            final_frequencies: [0.1, 30.0],
            iir: IirParams::default(),
            onset: AnalysisParams { folder: "onset".into(), evoked_limits: [-0.2, 0.5] },
            target: AnalysisParams { folder: "target".into(), evoked_limits: [-0.2, 1.0] },
        }
    }
}

impl EvokedConfig {
    pub fn validate(&self) -> error::Result<()> {
        self.iir.form()?;
        let [l, h] = self.final_frequencies;
        check_positive("final_frequencies low edge", l)?;
        check_window("final_frequencies", [l, h])?;
        check_window("onset evoked_limits", self.onset.evoked_limits)?;
        check_window("target evoked_limits", self.target.evoked_limits)?;
        Ok(())
    }
}

// ── ERP tables ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AepParams {
    pub subfolder: String,
    pub file_extension: String,
    pub cluster: Vec<String>,
    #[serde(rename = "P1_window")]
    pub p1_window: [f64; 2],
    #[serde(rename = "N1_window")]
    pub n1_window: [f64; 2],
    #[serde(rename = "P2_window")]
    pub p2_window: [f64; 2],
    /// Half-width of the averaging window around each peak, seconds.
    pub window_area: f64,
    pub dataframe_columns: Vec<String>,
    pub dataframe_filename: String,
}

impl Default for AepParams {
    fn default() -> Self {
        Self {
            subfolder: "onset".into(),
            file_extension: "-ave.safetensors".into(),
            cluster: ["Fz", "FC1", "FC2", "Cz"].map(String::from).to_vec(),
            p1_window: [0.03, 0.08],
            n1_window: [0.08, 0.15],
            p2_window: [0.15, 0.25],
            window_area: 0.01,
            dataframe_columns: [
                "participant_id",
                "P1_latency_ms",
                "P1_amplitude_uV",
                "N1_latency_ms",
                "N1_amplitude_uV",
                "P2_latency_ms",
                "P2_amplitude_uV",
            ]
            .map(String::from)
            .to_vec(),
            dataframe_filename: "AEP.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct N400Params {
    pub subfolder: String,
    pub context_file_extension: String,
    pub random_file_extension: String,
    pub cluster: Vec<String>,
    pub window: [f64; 2],
    pub window_area: f64,
    pub dataframe_filename: String,
}

impl Default for N400Params {
    fn default() -> Self {
        Self {
            subfolder: "target".into(),
            context_file_extension: "_context-ave.safetensors".into(),
            random_file_extension: "_random-ave.safetensors".into(),
            cluster: ["Cz", "CP1", "CP2", "Pz"].map(String::from).to_vec(),
            window: [0.3, 0.5],
            window_area: 0.025,
            dataframe_filename: "N400.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErpConfig {
    pub evoked_folder: PathBuf,
    pub output_folder: PathBuf,
    pub no_participants: usize,
    #[serde(rename = "AEP")]
    pub aep: AepParams,
    #[serde(rename = "N400")]
    pub n400: N400Params,
}

impl AepParams {
    pub fn validate(&self) -> error::Result<()> {
        if self.cluster.is_empty() {
            return Err(Error::config("AEP cluster is empty"));
        }
        check_window("P1_window", self.p1_window)?;
        check_window("N1_window", self.n1_window)?;
        check_window("P2_window", self.p2_window)?;
        check_positive("AEP window_area", self.window_area)?;
        if self.dataframe_columns.len() != 7 {
            return Err(Error::config(format!(
                "AEP dataframe_columns needs 7 names, got {}",
                self.dataframe_columns.len()
            )));
        }
        Ok(())
    }
}

impl N400Params {
    pub fn validate(&self) -> error::Result<()> {
        if self.cluster.is_empty() {
            return Err(Error::config("N400 cluster is empty"));
        }
        check_window("N400 window", self.window)?;
        check_positive("N400 window_area", self.window_area)
    }
}

impl ErpConfig {
    pub fn validate(&self) -> error::Result<()> {
        self.aep.validate()?;
        self.n400.validate()
    }
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            evoked_folder: PathBuf::from("data/evoked"),
            output_folder: PathBuf::from("results/evoked"),
            no_participants: 0,
            aep: AepParams::default(),
            n400: N400Params::default(),
        }
    }
}

// ── Statistics dataset ────────────────────────────────────────────────────

/// Inputs and layout of the merged tables handed to the statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Long PLV table written by the phase-locking stage.
    pub tracking_file: PathBuf,
    /// One row per participant, keyed by `participant_id`.
    pub participant_file: PathBuf,
    pub logs_folder: PathBuf,
    #[serde(rename = "AEP_file")]
    pub aep_file: PathBuf,
    #[serde(rename = "N400_file")]
    pub n400_file: PathBuf,
    pub data_folder: PathBuf,
    pub no_participants: usize,
    pub logs_txt_extension: String,
    /// Stimulus ids starting with this prefix are `context`, the rest `random`.
    pub context_prefix: String,
    /// Cluster name → channels.  A channel belongs to at most one cluster.
    pub eeg_clusters: BTreeMap<String, Vec<String>>,
    pub final_dataset_col_order: Vec<String>,
    pub csv_filename: String,
    #[serde(rename = "AEP_filename")]
    pub aep_filename: String,
    #[serde(rename = "N400_filename")]
    pub n400_filename: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        let cluster = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            tracking_file: PathBuf::from("results/tracking/tracking.csv"),
            participant_file: PathBuf::from("data/participants.csv"),
            logs_folder: PathBuf::from("data/logs"),
            aep_file: PathBuf::from("results/evoked/AEP.csv"),
            n400_file: PathBuf::from("results/evoked/N400.csv"),
            data_folder: PathBuf::from("results/statistics"),
            no_participants: 0,
            logs_txt_extension: ".txt".into(),
            context_prefix: "con".into(),
            eeg_clusters: BTreeMap::from([
                ("frontal".to_string(), cluster(&["F3", "Fz", "F4", "FC1", "FC2"])),
                ("central".to_string(), cluster(&["C3", "Cz", "C4"])),
                ("parietal".to_string(), cluster(&["CP1", "CP2", "P3", "Pz", "P4"])),
            ]),
            final_dataset_col_order: [
                "participant_id",
                "stimulus_id",
                "condition",
                "correct",
                "frequency_band",
                "cluster",
                "channel_id",
                "plv",
            ]
            .map(String::from)
            .to_vec(),
            csv_filename: "tracking_dataset.csv".into(),
            aep_filename: "AEP_dataset.csv".into(),
            n400_filename: "N400_dataset.csv".into(),
        }
    }
}

impl DatasetConfig {
    pub fn participants(&self) -> Vec<String> {
        participant_ids(self.no_participants)
    }

    pub fn validate(&self) -> error::Result<()> {
        if self.eeg_clusters.is_empty() {
            return Err(Error::config("eeg_clusters is empty"));
        }
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (cluster, channels) in &self.eeg_clusters {
            for ch in channels {
                if let Some(other) = seen.insert(ch.as_str(), cluster.as_str()) {
                    return Err(Error::config(format!(
                        "channel `{ch}` is in both `{other}` and `{cluster}` clusters"
                    )));
                }
            }
        }
        if self.final_dataset_col_order.is_empty() {
            return Err(Error::config("final_dataset_col_order is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_ids_are_zero_padded() {
        assert_eq!(participant_ids(2), vec!["p01", "p02"]);
        assert_eq!(participant_ids(12).last().unwrap(), "p12");
        assert!(participant_ids(0).is_empty());
    }

    #[test]
    fn mean_length_matches_arange() {
        let cfg = TrackingConfig { mean_length_s: 2.5, sfreq_goal: 128.0, ..Default::default() };
        assert_eq!(cfg.mean_length_samples(), 320);
        let cfg = TrackingConfig { mean_length_s: 2.501, sfreq_goal: 128.0, ..Default::default() };
        assert_eq!(cfg.mean_length_samples(), 321);
    }

    #[test]
    fn default_tracking_config_is_valid() {
        TrackingConfig::default().validate().unwrap();
    }

    #[test]
    fn band_above_nyquist_rejected() {
        let cfg = TrackingConfig {
            frequency_bands: vec![FrequencyBand::new("gamma", 30.0, 70.0, 7.0)],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn unknown_filter_family_rejected() {
        let iir = IirParams { ftype: "cheby1".into(), ..Default::default() };
        assert!(matches!(iir.form(), Err(Error::Configuration(_))));
        let iir = IirParams { output: "zpk".into(), ..Default::default() };
        assert!(matches!(iir.form(), Err(Error::Configuration(_))));
    }

    #[test]
    fn erp_yaml_uses_component_keys() {
        let cfg: ErpConfig = serde_yaml::from_str(
            "AEP:\n  P1_window: [0.04, 0.09]\n  window_area: 0.02\nno_participants: 4\n",
        )
        .unwrap();
        assert_eq!(cfg.aep.p1_window, [0.04, 0.09]);
        assert_eq!(cfg.aep.n1_window, AepParams::default().n1_window);
        assert_eq!(cfg.no_participants, 4);
    }

    #[test]
    fn default_stage_configs_are_valid() {
        SpectrumConfig::default().validate().unwrap();
        EvokedConfig::default().validate().unwrap();
        ErpConfig::default().validate().unwrap();
        DatasetConfig::default().validate().unwrap();
    }

    #[test]
    fn spectrum_config_rejects_bad_limits_and_durations() {
        let bad = |cfg: SpectrumConfig| matches!(cfg.validate(), Err(Error::Configuration(_)));
        let base = SpectrumConfig::default();
        assert!(bad(SpectrumConfig { spectrum_limits: SpectrumLimits { low: 32.0, high: 0.5 }, ..base.clone() }));
        assert!(bad(SpectrumConfig { spectrum_limits: SpectrumLimits { low: 0.5, high: 30_000.0 }, ..base.clone() }));
        assert!(bad(SpectrumConfig { compression: 0.0, ..base.clone() }));
        assert!(bad(SpectrumConfig { mean_duration_s: Some(0.0), ..base.clone() }));
        assert!(bad(SpectrumConfig { mean_duration_s: Some(1e-6), ..base.clone() }));
        assert!(bad(SpectrumConfig { gammatone: ErbSpacing { low: 100.0, high: 30_000.0, n: 8 }, ..base.clone() }));
        let mut props = base.clone();
        props.properties.tier_order = vec!["word".into()];
        assert!(bad(props));
        SpectrumConfig { mean_duration_s: Some(2.4), ..base }.validate().unwrap();
    }

    #[test]
    fn spectrum_yaml_is_validated_before_use() {
        let cfg: SpectrumConfig = serde_yaml::from_str("spectrum_limits: {low: 8.0, high: 4.0}\n").unwrap();
        assert!(matches!(cfg.validate(), Err(Error::Configuration(ref m)) if m.contains("spectrum_limits")));
    }

    #[test]
    fn evoked_config_rejects_inverted_limits() {
        let mut cfg = EvokedConfig::default();
        cfg.target.evoked_limits = [1.0, -0.2];
        assert!(matches!(cfg.validate(), Err(Error::Configuration(ref m)) if m.contains("target")));
        let cfg = EvokedConfig { final_frequencies: [30.0, 0.1], ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
        let cfg = EvokedConfig { final_frequencies: [0.0, 30.0], ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn erp_config_rejects_inverted_windows_and_empty_areas() {
        let cfg: ErpConfig = serde_yaml::from_str("AEP:\n  N1_window: [0.15, 0.08]\n").unwrap();
        assert!(matches!(cfg.validate(), Err(Error::Configuration(ref m)) if m.contains("N1_window")));
        let cfg: ErpConfig = serde_yaml::from_str("N400:\n  window_area: 0.0\n").unwrap();
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
        let cfg: ErpConfig = serde_yaml::from_str("N400:\n  window: [0.5, 0.3]\n").unwrap();
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
        let cfg: ErpConfig = serde_yaml::from_str("AEP:\n  cluster: []\n").unwrap();
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn dataset_clusters_must_not_overlap() {
        let mut cfg = DatasetConfig::default();
        cfg.eeg_clusters.insert("midline".into(), vec!["Fz".into(), "Oz".into()]);
        assert!(matches!(cfg.validate(), Err(Error::Configuration(ref m)) if m.contains("Fz")));
    }

    #[test]
    fn bands_deserialize_with_default_cycles() {
        let cfg: TrackingConfig = serde_yaml::from_str(
            "frequency_bands:\n  - {name: theta, fmin: 4.0, fmax: 8.0}\n",
        )
        .unwrap();
        assert_eq!(cfg.frequency_bands[0].n_cycles, 7.0);
    }
}

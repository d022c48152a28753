//! Trial-locked EEG epochs and their averages.
//!
//! An [`Epochs`] value pairs a signal tensor `[trial, channel, sample]` with
//! one [`TrialMetadata`] row per trial.  Every operation returns a new value;
//! nothing is mutated in place, so a chain such as
//!
//! ```text
//! epochs ─ filter_band ─ select(hit) ─ apply_baseline(None, 0) ─ crop ─ average
//! ```
//!
//! can be re-run or inspected stage by stage.
use ndarray::{s, Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;

use crate::config::IirParams;
use crate::error::{Error, Result};
use crate::filter::filter_data;
use crate::resample::{check_downsample, integer_factor, resample};

/// Slack, in samples, when mapping a time in seconds onto a sample index.
const TIME_TOL: f64 = 1e-6;

/// One row of the behavioural log joined to a trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialMetadata {
    /// Presentation index, 0-based.
    pub trial: usize,
    pub stimulus_id: String,
    /// Stimulus id without its 3-character item number (`context012 → context`).
    pub condition: String,
    /// Whether the participant answered correctly.
    pub hit: bool,
}

impl TrialMetadata {
    pub fn new(trial: usize, stimulus_id: &str, hit: bool) -> Self {
        Self {
            trial,
            stimulus_id: stimulus_id.to_string(),
            condition: condition_of(stimulus_id).to_string(),
            hit,
        }
    }
}

/// Condition label of a stimulus id: everything but the last 3 characters.
pub fn condition_of(stimulus_id: &str) -> &str {
    let cut = stimulus_id
        .char_indices()
        .rev()
        .nth(2)
        .map_or(0, |(i, _)| i);
    &stimulus_id[..cut]
}

/// Index of the first sample at or after `t` on a grid starting at `t0`.
fn index_at_or_after(t: f64, t0: f64, sfreq: f64) -> i64 {
    ((t - t0) * sfreq - TIME_TOL).ceil() as i64
}

/// Index of the last sample at or before `t` on a grid starting at `t0`.
fn index_at_or_before(t: f64, t0: f64, sfreq: f64) -> i64 {
    ((t - t0) * sfreq + TIME_TOL).floor() as i64
}

/// `tmin + i / sfreq` for `n` samples.
pub fn time_axis(n: usize, sfreq: f64, tmin: f64) -> Vec<f64> {
    (0..n).map(|i| tmin + i as f64 / sfreq).collect()
}

// ── Epochs ──────────────────────────────────────────────────────────────────

/// Trial-locked signals plus per-trial metadata.
#[derive(Debug, Clone)]
pub struct Epochs {
    data: Array3<f64>,
    ch_names: Vec<String>,
    sfreq: f64,
    tmin: f64,
    metadata: Vec<TrialMetadata>,
}

impl Epochs {
    /// # Errors
    ///
    /// [`Error::Input`] if the channel names or metadata rows do not match
    /// the tensor's channel and trial axes, or `sfreq` is not positive.
    pub fn new(
        data: Array3<f64>,
        ch_names: Vec<String>,
        sfreq: f64,
        tmin: f64,
        metadata: Vec<TrialMetadata>,
    ) -> Result<Self> {
        let (n_trials, n_ch, _) = data.dim();
        if ch_names.len() != n_ch {
            return Err(Error::input(format!(
                "{} channel names for {n_ch} channels",
                ch_names.len()
            )));
        }
        if metadata.len() != n_trials {
            return Err(Error::input(format!(
                "{} metadata rows for {n_trials} trials",
                metadata.len()
            )));
        }
        if !(sfreq > 0.0) {
            return Err(Error::input(format!("sampling rate must be positive, got {sfreq}")));
        }
        Ok(Self { data, ch_names, sfreq, tmin, metadata })
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn tmin(&self) -> f64 {
        self.tmin
    }

    pub fn metadata(&self) -> &[TrialMetadata] {
        &self.metadata
    }

    pub fn n_trials(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_channels(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_times(&self) -> usize {
        self.data.dim().2
    }

    pub fn times(&self) -> Vec<f64> {
        time_axis(self.n_times(), self.sfreq, self.tmin)
    }

    /// Stimulus ids in presentation order.
    pub fn stimulus_ids(&self) -> Vec<String> {
        self.metadata.iter().map(|m| m.stimulus_id.clone()).collect()
    }

    fn with_data(&self, data: Array3<f64>, sfreq: f64, tmin: f64) -> Self {
        Self {
            data,
            ch_names: self.ch_names.clone(),
            sfreq,
            tmin,
            metadata: self.metadata.clone(),
        }
    }

    /// Zero-phase IIR filter of every trial and channel.
    ///
    /// `(None, Some(h))` lowpass, `(Some(l), None)` highpass,
    /// `(Some(l), Some(h))` bandpass.
    pub fn filter_band(&self, l_freq: Option<f64>, h_freq: Option<f64>, iir: &IirParams) -> Result<Self> {
        let trials: Vec<Array2<f64>> = self
            .data
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|trial| {
                let mut out = Array2::zeros(trial.raw_dim());
                for (ch, row) in trial.axis_iter(Axis(0)).enumerate() {
                    let y = filter_data(&row.to_vec(), self.sfreq, l_freq, h_freq, iir)?;
                    out.row_mut(ch).assign(&ArrayView1::from(&y));
                }
                Ok(out)
            })
            .collect::<Result<_>>()?;
        Ok(self.with_data(stack_trials(&trials, self.data.raw_dim()), self.sfreq, self.tmin))
    }

    /// Reduce the rate to `sfreq_goal`.
    ///
    /// Integral ratios keep every n-th sample, aligned so that the sample at
    /// `t = 0` survives; other ratios go through the FFT resampler.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] unless `sfreq / sfreq_goal > 1`.
    pub fn decimate(&self, sfreq_goal: f64) -> Result<Self> {
        check_downsample(self.sfreq, sfreq_goal)?;
        let (n_trials, n_ch, n_t) = self.data.dim();
        match integer_factor(self.sfreq, sfreq_goal) {
            Some(factor) => {
                let zero_idx = (-self.tmin * self.sfreq).round() as i64;
                let offset = zero_idx.rem_euclid(factor as i64) as usize;
                if offset >= n_t {
                    return Err(Error::input(format!("{n_t} samples are too few to decimate by {factor}")));
                }
                let data = self.data.slice(s![.., .., offset..;factor]).to_owned();
                let tmin = self.tmin + offset as f64 / self.sfreq;
                Ok(self.with_data(data, sfreq_goal, tmin))
            }
            None => {
                let n_out = (n_t as f64 * sfreq_goal / self.sfreq).round() as usize;
                let mut data = Array3::zeros((n_trials, n_ch, n_out));
                for e in 0..n_trials {
                    for c in 0..n_ch {
                        let y = resample(&self.data.slice(s![e, c, ..]).to_vec(), self.sfreq, sfreq_goal);
                        data.slice_mut(s![e, c, ..]).assign(&ArrayView1::from(&y));
                    }
                }
                Ok(self.with_data(data, sfreq_goal, self.tmin))
            }
        }
    }

    /// Keep samples with `tmin <= t <= tmax`.  A `tmax` past the last sample
    /// is clamped.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if no sample falls inside the interval.
    pub fn crop(&self, tmin: f64, tmax: f64) -> Result<Self> {
        let (start, stop) = crop_bounds(self.n_times(), self.sfreq, self.tmin, tmin, tmax)?;
        let data = self.data.slice(s![.., .., start..stop]).to_owned();
        Ok(self.with_data(data, self.sfreq, self.tmin + start as f64 / self.sfreq))
    }

    /// Trials whose metadata satisfies `keep`, in their original order.
    pub fn select(&self, keep: impl Fn(&TrialMetadata) -> bool) -> Self {
        let idx: Vec<usize> = (0..self.n_trials()).filter(|&i| keep(&self.metadata[i])).collect();
        Self {
            data: self.data.select(Axis(0), &idx),
            ch_names: self.ch_names.clone(),
            sfreq: self.sfreq,
            tmin: self.tmin,
            metadata: idx.iter().map(|&i| self.metadata[i].clone()).collect(),
        }
    }

    /// Subtract, per trial and channel, the mean over `[start, end]` seconds.
    /// `start = None` means the first sample.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if the baseline interval holds no samples.
    pub fn apply_baseline(&self, start: Option<f64>, end: f64) -> Result<Self> {
        let (b0, b1) = crop_bounds(self.n_times(), self.sfreq, self.tmin, start.unwrap_or(self.tmin), end)?;
        let mut data = self.data.clone();
        for mut trial in data.axis_iter_mut(Axis(0)) {
            for mut row in trial.axis_iter_mut(Axis(0)) {
                let m = row.slice(s![b0..b1]).mean().unwrap_or(0.0);
                row.mapv_inplace(|v| v - m);
            }
        }
        Ok(self.with_data(data, self.sfreq, self.tmin))
    }

    /// Average over trials.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if there are no trials to average.
    pub fn average(&self) -> Result<Evoked> {
        let data = self
            .data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::input("cannot average zero epochs"))?;
        Ok(Evoked {
            data,
            ch_names: self.ch_names.clone(),
            sfreq: self.sfreq,
            tmin: self.tmin,
            nave: self.n_trials(),
        })
    }

    /// Correct trials, band-passed, baseline-corrected and cropped.
    fn correct_trials(&self, band: [f64; 2], iir: &IirParams, limits: [f64; 2]) -> Result<Self> {
        self.filter_band(Some(band[0]), Some(band[1]), iir)?
            .select(|m| m.hit)
            .apply_baseline(None, 0.0)?
            .crop(limits[0], limits[1])
    }

    /// Average of the correctly answered trials: band-pass to `band`,
    /// baseline on `[tmin, 0]`, crop to `limits`, average.
    pub fn evoked_response(&self, band: [f64; 2], iir: &IirParams, limits: [f64; 2]) -> Result<Evoked> {
        self.correct_trials(band, iir, limits)?.average()
    }

    /// One [`evoked_response`](Self::evoked_response) per condition label,
    /// in the order of `conditions`.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if a condition has no correct trials.
    pub fn evoked_by_condition(
        &self,
        conditions: &[&str],
        band: [f64; 2],
        iir: &IirParams,
        limits: [f64; 2],
    ) -> Result<Vec<Evoked>> {
        let trials = self.correct_trials(band, iir, limits)?;
        conditions
            .iter()
            .map(|&condition| {
                let subset = trials.select(|m| m.condition == condition);
                if subset.n_trials() == 0 {
                    return Err(Error::input(format!("no correct `{condition}` trials to average")));
                }
                subset.average()
            })
            .collect()
    }
}

/// `[start, stop)` sample range for the closed interval `[tmin, tmax]`.
fn crop_bounds(n: usize, sfreq: f64, t0: f64, tmin: f64, tmax: f64) -> Result<(usize, usize)> {
    let start = index_at_or_after(tmin, t0, sfreq).max(0);
    let last = index_at_or_before(tmax, t0, sfreq).min(n as i64 - 1);
    if tmin > tmax || start > last {
        return Err(Error::input(format!(
            "time interval [{tmin}, {tmax}] s holds no samples (data spans {t0} s + {n} samples)"
        )));
    }
    Ok((start as usize, last as usize + 1))
}

fn stack_trials(trials: &[Array2<f64>], dim: ndarray::Ix3) -> Array3<f64> {
    let mut out = Array3::zeros(dim);
    for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(trials) {
        dst.assign(src);
    }
    out
}

// ── Evoked ──────────────────────────────────────────────────────────────────

/// Trial average, `[channel, sample]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Evoked {
    data: Array2<f64>,
    ch_names: Vec<String>,
    sfreq: f64,
    tmin: f64,
    nave: usize,
}

impl Evoked {
    /// # Errors
    ///
    /// [`Error::Input`] if the channel names do not match the channel axis.
    pub fn new(data: Array2<f64>, ch_names: Vec<String>, sfreq: f64, tmin: f64, nave: usize) -> Result<Self> {
        if ch_names.len() != data.nrows() {
            return Err(Error::input(format!(
                "{} channel names for {} channels",
                ch_names.len(),
                data.nrows()
            )));
        }
        Ok(Self { data, ch_names, sfreq, tmin, nave })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn tmin(&self) -> f64 {
        self.tmin
    }

    /// Number of trials averaged.
    pub fn nave(&self) -> usize {
        self.nave
    }

    pub fn times(&self) -> Vec<f64> {
        time_axis(self.data.ncols(), self.sfreq, self.tmin)
    }
}

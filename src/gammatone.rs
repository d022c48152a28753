//! Gammatone filterbank (Slaney's ERB filters, as used by Brian Hears).
//!
//! Each channel is a 4th-order gammatone realised as four cascaded biquads
//! with bandwidth `1.019 · ERB(cf)`, where `ERB(cf) = cf / 9.26449 + 24.7`
//! (Glasberg & Moore).  The cascade is normalised to unit gain at its centre
//! frequency and run causally from a zero state.
use std::f64::consts::PI;

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::filter::{sos_gain, sosfilt, Sos};

const EAR_Q: f64 = 9.26449;
const MIN_BW: f64 = 24.7;

/// `n` centre frequencies from `low` to `high` (ascending), uniformly spaced
/// on the ERB-rate scale.
pub fn erb_space(low: f64, high: f64, n: usize) -> Result<Vec<f64>> {
    if n == 0 {
        return Err(Error::config("need at least one gammatone channel"));
    }
    if !(low > 0.0 && low < high) {
        return Err(Error::config(format!(
            "gammatone range must satisfy 0 < low < high (got {low}..{high})"
        )));
    }
    if n == 1 {
        return Ok(vec![low]);
    }
    let eq = EAR_Q * MIN_BW;
    let step = ((low + eq).ln() - (high + eq).ln()) / (n - 1) as f64;
    let mut cf: Vec<f64> = (0..n).map(|i| -eq + (i as f64 * step).exp() * (high + eq)).collect();
    cf.reverse();
    Ok(cf)
}

/// Equivalent rectangular bandwidth at `cf` Hz.
pub fn erb(cf: f64) -> f64 {
    cf / EAR_Q + MIN_BW
}

/// A bank of 4th-order gammatone filters at fixed centre frequencies.
#[derive(Debug, Clone)]
pub struct GammatoneFilterbank {
    sfreq: f64,
    center_freqs: Vec<f64>,
    sections: Vec<[Sos; 4]>,
}

impl GammatoneFilterbank {
    /// # Errors
    ///
    /// [`Error::Input`] if `center_freqs` is empty or contains a frequency
    /// that is not strictly between 0 and the Nyquist frequency.
    pub fn new(center_freqs: &[f64], sfreq: f64) -> Result<Self> {
        if center_freqs.is_empty() {
            return Err(Error::input("gammatone filterbank needs at least one centre frequency"));
        }
        let nyq = sfreq / 2.0;
        if let Some(&bad) = center_freqs.iter().find(|&&cf| !(cf > 0.0 && cf < nyq)) {
            return Err(Error::input(format!(
                "gammatone centre frequency {bad} Hz outside (0, {nyq}) Hz"
            )));
        }
        let sections = center_freqs.iter().map(|&cf| erb_sections(cf, sfreq)).collect();
        Ok(Self { sfreq, center_freqs: center_freqs.to_vec(), sections })
    }

    pub fn center_freqs(&self) -> &[f64] {
        &self.center_freqs
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn n_bands(&self) -> usize {
        self.center_freqs.len()
    }

    /// Filter `x` through every channel.  Returns `[n_bands, x.len()]`.
    pub fn process(&self, x: &[f64]) -> Array2<f64> {
        let rows: Vec<Vec<f64>> = self
            .sections
            .par_iter()
            .map(|sos| {
                let mut state = [[0.0; 2]; 4];
                sosfilt(sos, x, &mut state)
            })
            .collect();
        let mut out = Array2::<f64>::zeros((rows.len(), x.len()));
        for (mut row, band) in out.rows_mut().into_iter().zip(rows) {
            row.assign(&ndarray::ArrayView1::from(&band));
        }
        out
    }
}

/// Slaney's `MakeERBFilters` coefficients for one channel.
fn erb_sections(cf: f64, sfreq: f64) -> [Sos; 4] {
    let t = 1.0 / sfreq;
    let b = 1.019 * 2.0 * PI * erb(cf);
    let arg = 2.0 * PI * cf * t;
    let (sin, cos) = arg.sin_cos();
    let decay = (b * t).exp();

    let a0 = t;
    let a2 = 0.0;
    let b1 = -2.0 * cos / decay;
    let b2 = (-2.0 * b * t).exp();

    let s_plus = (3.0 + 2.0f64.powf(1.5)).sqrt();
    let s_minus = (3.0 - 2.0f64.powf(1.5)).sqrt();
    let a1 = |s: f64, sign: f64| -(2.0 * t * cos / decay + sign * 2.0 * s * t * sin / decay) / 2.0;

    let mut sections = [
        [a0, a1(s_plus, 1.0), a2, 1.0, b1, b2],
        [a0, a1(s_plus, -1.0), a2, 1.0, b1, b2],
        [a0, a1(s_minus, 1.0), a2, 1.0, b1, b2],
        [a0, a1(s_minus, -1.0), a2, 1.0, b1, b2],
    ];
    let gain = sos_gain(&sections, cf, sfreq);
    for v in &mut sections[0][..3] {
        *v /= gain;
    }
    sections
}

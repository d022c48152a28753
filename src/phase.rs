//! Band-limited instantaneous phase of envelopes and EEG epochs.
//!
//! Both variants run the same chain:
//!
//! ```text
//! signal ─ zero-phase IIR band-pass [fmin, fmax] ─ downsample → sfreq_goal
//!        ─ (EEG only: crop to [0, tmax]) ─ angle(hilbert(·))
//! ```
//!
//! The band is checked against the Nyquist frequency of `sfreq_goal`, not
//! of the input rate, since the phase is only meaningful at the output rate.
use ndarray::{Array3, ArrayView1, Axis};
use rayon::prelude::*;

use crate::config::{check_band, IirParams};
use crate::epoch::Epochs;
use crate::error::{Error, Result};
use crate::filter::filter_data;
use crate::hilbert::instantaneous_phase;
use crate::resample::{check_downsample, downsample};

fn check_phase_band(sfreq: f64, sfreq_goal: f64, fmin: f64, fmax: f64) -> Result<()> {
    check_band(fmin, fmax, sfreq_goal).map_err(Error::Configuration)?;
    check_downsample(sfreq, sfreq_goal)
}

/// Instantaneous phase of `signal` in the band `[fmin, fmax]`, at
/// `sfreq_goal`.  Values lie in (−π, π].
///
/// # Errors
///
/// [`Error::Configuration`] if `fmin >= fmax`, either edge is not below
/// `sfreq_goal / 2`, `sfreq / sfreq_goal <= 1`, or `iir` is invalid.
pub fn extract_phase(
    signal: &[f64],
    sfreq: f64,
    sfreq_goal: f64,
    fmin: f64,
    fmax: f64,
    iir: &IirParams,
) -> Result<Vec<f64>> {
    check_phase_band(sfreq, sfreq_goal, fmin, fmax)?;
    let filtered = filter_data(signal, sfreq, Some(fmin), Some(fmax), iir)?;
    let down = downsample(&filtered, sfreq, sfreq_goal, 0)?;
    Ok(instantaneous_phase(&down))
}

/// EEG variant of [`extract_phase`]: every trial and channel of `epochs`,
/// cropped to `[0, tmax]` seconds before the Hilbert step.
///
/// Returns `[trial, channel, sample]` in the epochs' trial order.
///
/// # Errors
///
/// As [`extract_phase`], plus [`Error::Input`] when the epochs hold no
/// samples in `[0, tmax]`.
pub fn extract_eeg_phase(
    epochs: &Epochs,
    sfreq_goal: f64,
    fmin: f64,
    fmax: f64,
    tmax: f64,
    iir: &IirParams,
) -> Result<Array3<f64>> {
    check_phase_band(epochs.sfreq(), sfreq_goal, fmin, fmax)?;
    let cropped = epochs
        .filter_band(Some(fmin), Some(fmax), iir)?
        .decimate(sfreq_goal)?
        .crop(0.0, tmax)?;

    let mut phase = Array3::zeros(cropped.data().raw_dim());
    phase
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(cropped.data().axis_iter(Axis(0)))
        .for_each(|(mut dst, src)| {
            for (mut d, s) in dst.axis_iter_mut(Axis(0)).zip(src.axis_iter(Axis(0))) {
                d.assign(&ArrayView1::from(&instantaneous_phase(&s.to_vec())));
            }
        });
    Ok(phase)
}

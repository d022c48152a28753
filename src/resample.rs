//! FFT-based resampler matching MNE's `resample(..., npad='auto')`, plus
//! integer decimation.
//!
//! Resampling algorithm (from `mne/cuda.py _fft_resample`):
//!   1. Pad with `auto_npad` reflect-limited samples on each side.
//!   2. rfft(padded)  →  complex half-spectrum.
//!   3. If downsampling: double the Nyquist bin (use_len = new_len).
//!      If upsampling:   halve  the Nyquist bin (use_len = old_len).
//!   4. Scale all bins by `new_len_padded / old_len_padded`.
//!   5. irfft(spectrum, n=new_len_padded).
//!   6. Strip the resampled padding edges.
//!
//! [`downsample`] is the rate reduction used by the phase extractors: an
//! integral ratio keeps every n-th sample, anything else goes through the
//! FFT resampler.
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::{Error, Result};
use crate::filter::apply::odd_extend;

/// Tolerance when deciding whether `sfreq / sfreq_goal` is an integer.
const RATIO_TOL: f64 = 1e-9;

/// Compute the auto npad as MNE does: pad to the next power of 2.
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// npads   = [total // 2, total - total // 2]
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let sum = n + min_add;
    let next_pow2 = 1usize << ((sum as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Exact output length: `round(n * dst / src)`.
pub fn final_length(n: usize, src_sfreq: f64, dst_sfreq: f64) -> usize {
    (n as f64 * dst_sfreq / src_sfreq).round() as usize
}

/// Resample `x` from `src_sfreq` to `dst_sfreq` with automatic padding.
pub fn resample(x: &[f64], src_sfreq: f64, dst_sfreq: f64) -> Vec<f64> {
    if (src_sfreq - dst_sfreq).abs() < 1e-9 {
        return x.to_vec();
    }
    let (npad_l, npad_r) = auto_npad(x.len());
    resample_1d(x, dst_sfreq / src_sfreq, npad_l, npad_r)
}

/// Resample a single signal by `ratio = dst / src` with explicit (possibly
/// asymmetric) padding.
pub fn resample_1d(x: &[f64], ratio: f64, npad_l: usize, npad_r: usize) -> Vec<f64> {
    let n_in = x.len();
    if n_in == 0 {
        return vec![];
    }
    let final_len = (ratio * n_in as f64).round() as usize;

    // --- 1. Reflect-limited padding (clamped to n_in - 1 per side) ---------
    let pad_l = npad_l.min(n_in - 1);
    let pad_r = npad_r.min(n_in - 1);
    let mut x_ext = odd_extend(x, pad_l.max(pad_r));
    let extra_l = pad_l.max(pad_r) - pad_l;
    let extra_r = pad_l.max(pad_r) - pad_r;
    x_ext.drain(..extra_l);
    x_ext.truncate(x_ext.len() - extra_r);
    let old_len = x_ext.len();

    // --- 2. Padded output length -----------------------------------------
    let new_len_padded = (ratio * old_len as f64).round() as usize;
    let shorter = new_len_padded < old_len;
    let use_len = if shorter { new_len_padded } else { old_len };

    // --- 3. rfft via a full complex FFT ----------------------------------
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let mut buf: Vec<Complex64> = x_ext.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut buf);
    let rfft_len = old_len / 2 + 1;
    let mut x_fft: Vec<Complex64> = buf[..rfft_len].to_vec();

    // --- 4. Nyquist bin --------------------------------------------------
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if nyq < x_fft.len() {
            x_fft[nyq] *= if shorter { 2.0 } else { 0.5 };
        }
    }

    // --- 5. Boxcar scale -------------------------------------------------
    let scale = new_len_padded as f64 / old_len as f64;
    for v in &mut x_fft {
        *v *= scale;
    }

    // --- 6. irfft(x_fft, n=new_len_padded) -------------------------------
    let new_rfft_len = new_len_padded / 2 + 1;
    let mut irfft_in = vec![Complex64::default(); new_len_padded];
    let n_copy = x_fft.len().min(new_rfft_len);
    irfft_in[..n_copy].copy_from_slice(&x_fft[..n_copy]);
    for i in 1..new_rfft_len {
        let idx = new_len_padded - i;
        if idx >= new_rfft_len {
            irfft_in[idx] = irfft_in[i].conj();
        }
    }
    planner.plan_fft_inverse(new_len_padded).process(&mut irfft_in);
    let inv_scale = 1.0 / new_len_padded as f64;

    // --- 7. Strip padding ------------------------------------------------
    let to_remove_l = (ratio * pad_l as f64).round() as usize;
    let start = to_remove_l.min(new_len_padded);
    let end = (start + final_len).min(new_len_padded);
    let mut result: Vec<f64> = irfft_in[start..end].iter().map(|c| c.re * inv_scale).collect();
    result.resize(final_len, 0.0);
    result
}

/// Keep every `factor`-th sample starting at `offset`.
pub fn decimate(x: &[f64], factor: usize, offset: usize) -> Vec<f64> {
    x.iter().skip(offset).step_by(factor.max(1)).copied().collect()
}

/// `Some(n)` when `sfreq / sfreq_goal` is the integer `n`.
pub fn integer_factor(sfreq: f64, sfreq_goal: f64) -> Option<usize> {
    let ratio = sfreq / sfreq_goal;
    let rounded = ratio.round();
    ((ratio - rounded).abs() < RATIO_TOL && rounded >= 1.0).then_some(rounded as usize)
}

/// Reduce the rate of an already band-limited signal from `sfreq` to
/// `sfreq_goal`.
///
/// This stage only ever decimates: the ratio `sfreq / sfreq_goal` must be
/// greater than one.  Integral ratios keep every n-th sample starting at
/// `offset`; other ratios use the FFT resampler (and ignore `offset`).
pub fn downsample(x: &[f64], sfreq: f64, sfreq_goal: f64, offset: usize) -> Result<Vec<f64>> {
    check_downsample(sfreq, sfreq_goal)?;
    Ok(match integer_factor(sfreq, sfreq_goal) {
        Some(factor) => decimate(x, factor, offset),
        None => resample(x, sfreq, sfreq_goal),
    })
}

pub(crate) fn check_downsample(sfreq: f64, sfreq_goal: f64) -> Result<()> {
    if !(sfreq_goal > 0.0 && sfreq / sfreq_goal > 1.0) {
        return Err(Error::config(format!(
            "can only decimate: sfreq ({sfreq}) must exceed sfreq_goal ({sfreq_goal})"
        )));
    }
    Ok(())
}

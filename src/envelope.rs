//! Broadband speech envelope from a gammatone filterbank.
//!
//! ```text
//! waveform ─ gammatone bank ─ max(x, 0)^c ─ mean over bands
//!          ─ lowpass (sfreq_goal / 3) ─ FFT resample → sfreq_goal
//! ```
use ndarray::{Array2, Axis};

use crate::config::IirParams;
use crate::error::{Error, Result};
use crate::filter::filter_data;
use crate::gammatone::GammatoneFilterbank;
use crate::resample::resample;
use crate::waveform::Waveform;

/// Half-wave rectify every subband and raise it to `compression`.
pub fn compress_subbands(subbands: &Array2<f64>, compression: f64) -> Array2<f64> {
    subbands.mapv(|v| v.max(0.0).powf(compression))
}

/// Broadband envelope of a mono waveform at `sfreq_goal`.
///
/// The anti-alias lowpass cuts at `sfreq_goal / 3` with the IIR design in
/// `iir`.  The output has `round(len · sfreq_goal / sfreq)` samples; callers
/// that need a fixed length pass the result through [`fit_length`].
///
/// # Errors
///
/// * [`Error::Input`] if the waveform is not mono or a centre frequency is
///   not strictly between 0 and Nyquist.
/// * [`Error::Configuration`] for a non-positive compression exponent or an
///   invalid IIR setup.
pub fn extract_envelope(
    waveform: &Waveform,
    center_freqs: &[f64],
    compression: f64,
    sfreq_goal: f64,
    iir: &IirParams,
) -> Result<Vec<f64>> {
    let x = waveform.mono()?;
    if compression <= 0.0 {
        return Err(Error::config(format!("compression exponent must be positive, got {compression}")));
    }
    let sfreq = waveform.sfreq();
    let bank = GammatoneFilterbank::new(center_freqs, sfreq)?;
    let x: Vec<f64> = x.to_vec();

    let subbands = compress_subbands(&bank.process(&x), compression);
    let envelope = subbands
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::input("gammatone bank produced no subbands"))?;

    let envelope = filter_data(&envelope.to_vec(), sfreq, None, Some(sfreq_goal / 3.0), iir)?;
    Ok(resample(&envelope, sfreq, sfreq_goal))
}

/// Right-zero-pad or truncate `x` to exactly `n` samples.
pub fn fit_length(x: &[f64], n: usize) -> Vec<f64> {
    let mut out: Vec<f64> = x.iter().take(n).copied().collect();
    out.resize(n, 0.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn compression_rectifies_then_powers() {
        let x = array![[-1.0, 0.0, 4.0], [9.0, -0.5, 1.0]];
        let y = compress_subbands(&x, 0.5);
        assert_eq!(y, array![[0.0, 0.0, 2.0], [3.0, 0.0, 1.0]]);
    }

    #[test]
    fn fit_length_pads_and_truncates() {
        assert_eq!(fit_length(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_length(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        let same = vec![0.1, 0.2, 0.3];
        assert_eq!(fit_length(&same, 3), same);
    }

    #[test]
    fn envelope_follows_modulator() {
        let sfreq = 8000.0;
        let x: Vec<f64> = (0..8000)
            .map(|i| {
                let t = i as f64 / sfreq;
                // 4 Hz amplitude modulation of a 1 kHz carrier
                (1.0 + (2.0 * std::f64::consts::PI * 4.0 * t).sin())
                    * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()
            })
            .collect();
        let w = Waveform::from_mono(x, sfreq);
        let env = extract_envelope(&w, &[500.0, 1000.0, 2000.0], 0.6, 100.0, &IirParams::default()).unwrap();
        assert_eq!(env.len(), 100);
        // Peaks of 1 + sin(2π·4t) sit at t = 1/16 + k/4; troughs half a cycle later.
        let peak = env[31]; // t = 0.3125
        let trough = env[44]; // t = 0.4375
        assert!(peak > trough, "peak {peak} trough {trough}");
    }

    #[test]
    fn stereo_is_input_error() {
        let w = Waveform::new(Array2::zeros((2, 100)), 8000.0);
        let err = extract_envelope(&w, &[1000.0], 0.6, 100.0, &IirParams::default()).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn no_centre_frequencies_is_input_error() {
        let w = Waveform::from_mono(vec![0.0; 100], 8000.0);
        let err = extract_envelope(&w, &[], 0.6, 100.0, &IirParams::default()).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn negative_centre_frequency_is_input_error() {
        let w = Waveform::from_mono(vec![0.0; 100], 8000.0);
        let err = extract_envelope(&w, &[-10.0, 1000.0], 0.6, 100.0, &IirParams::default()).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}

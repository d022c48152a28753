//! Corpus modulation spectrum after Ding et al. (2017).
//!
//! Per stimulus:
//!   1. Gammatone filterbank, half-wave rectification and compression
//!      (as in [`crate::envelope`], but without averaging the subbands).
//!   2. Pad/truncate every subband to `mean_samples`.
//!   3. |rfft| per subband, RMS across subbands, then weight by √f.
//!
//! Across the corpus: RMS over stimuli, normalise by the maximum inside
//! `spectrum_limits`, and restrict both axes to that closed interval.
use std::sync::Arc;

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::config::SpectrumLimits;
use crate::envelope::{compress_subbands, fit_length};
use crate::error::{Error, Result};
use crate::gammatone::GammatoneFilterbank;
use crate::waveform::Waveform;

/// Normalised modulation spectrum restricted to the configured limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulationSpectrum {
    /// Frequency of every bin, Hz.
    pub freqs: Vec<f64>,
    /// RMS magnitude, maximum 1 inside the limits.
    pub spectrum: Vec<f64>,
}

/// Bin frequencies of an `n`-point real FFT (`numpy.fft.rfftfreq`).
pub fn rfft_freqs(n: usize, sfreq: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * sfreq / n as f64).collect()
}

fn rfft_magnitude(fft: &Arc<dyn Fft<f64>>, x: &[f64]) -> Vec<f64> {
    let mut buf: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fft.process(&mut buf);
    buf.truncate(x.len() / 2 + 1);
    buf.iter().map(|c| c.norm()).collect()
}

fn rms_rows(rows: &Array2<f64>) -> Vec<f64> {
    rows.mapv(|v| v * v)
        .mean_axis(Axis(0))
        .map_or_else(Vec::new, |m| m.mapv(f64::sqrt).to_vec())
}

/// Compressed gammatone subbands of one mono stimulus, each fitted to
/// `mean_samples`.  Returns `[n_bands, mean_samples]`.
fn fitted_subbands(
    bank: &GammatoneFilterbank,
    stimulus: &Waveform,
    compression: f64,
    mean_samples: usize,
) -> Result<Array2<f64>> {
    let x = stimulus.mono()?.to_vec();
    let subbands = compress_subbands(&bank.process(&x), compression);
    let mut out = Array2::zeros((subbands.nrows(), mean_samples));
    for (mut dst, src) in out.rows_mut().into_iter().zip(subbands.rows()) {
        let fitted = fit_length(&src.to_vec(), mean_samples);
        dst.assign(&ndarray::ArrayView1::from(&fitted));
    }
    Ok(out)
}

/// Every stimulus must be sampled at `sfreq`.
fn check_rates(stimuli: &[Waveform], sfreq: f64) -> Result<()> {
    match stimuli.iter().position(|s| (s.sfreq() - sfreq).abs() > 1e-6) {
        Some(i) => Err(Error::input(format!(
            "stimulus {i} is sampled at {} Hz, expected {sfreq} Hz",
            stimuli[i].sfreq()
        ))),
        None => Ok(()),
    }
}

/// √f-weighted RMS-across-subbands spectrum of one stimulus.
fn stimulus_spectrum(
    bank: &GammatoneFilterbank,
    fft: &Arc<dyn Fft<f64>>,
    weights: &[f64],
    stimulus: &Waveform,
    compression: f64,
    mean_samples: usize,
) -> Result<Vec<f64>> {
    let subbands = fitted_subbands(bank, stimulus, compression, mean_samples)?;
    let spectra: Vec<Vec<f64>> = subbands
        .rows()
        .into_iter()
        .map(|band| rfft_magnitude(fft, &band.to_vec()))
        .collect();
    let n_bins = weights.len();
    let spectra = Array2::from_shape_vec((spectra.len(), n_bins), spectra.concat())
        .map_err(|e| Error::input(e.to_string()))?;
    Ok(rms_rows(&spectra).iter().zip(weights).map(|(s, w)| s * w).collect())
}

/// Modulation spectrum of a corpus of mono stimuli at `sfreq`.
///
/// # Errors
///
/// * [`Error::Input`] for an empty corpus, a non-mono stimulus, a stimulus
///   not sampled at `sfreq`, bad centre frequencies, or a spectrum that is zero everywhere inside the limits.
/// * [`Error::Configuration`] if `limits.low >= limits.high`, `mean_samples`
///   is zero, `compression <= 0`, or no bin falls inside the limits.
pub fn compute_modulation_spectrum(
    stimuli: &[Waveform],
    center_freqs: &[f64],
    sfreq: f64,
    mean_samples: usize,
    compression: f64,
    limits: SpectrumLimits,
) -> Result<ModulationSpectrum> {
    if stimuli.is_empty() {
        return Err(Error::input("modulation spectrum needs at least one stimulus"));
    }
    if !(limits.low < limits.high) {
        return Err(Error::config(format!(
            "spectrum limits must satisfy low < high (got {}..{})",
            limits.low, limits.high
        )));
    }
    if mean_samples == 0 {
        return Err(Error::config("reference length must be at least one sample"));
    }
    if compression <= 0.0 {
        return Err(Error::config(format!("compression exponent must be positive, got {compression}")));
    }
    check_rates(stimuli, sfreq)?;

    let xf = rfft_freqs(mean_samples, sfreq);
    let in_range: Vec<bool> = xf.iter().map(|&f| f >= limits.low && f <= limits.high).collect();
    if !in_range.iter().any(|&b| b) {
        return Err(Error::config(format!(
            "no frequency bin inside [{}, {}] Hz at resolution {} Hz",
            limits.low,
            limits.high,
            sfreq / mean_samples as f64
        )));
    }

    let bank = GammatoneFilterbank::new(center_freqs, sfreq)?;
    let fft = FftPlanner::new().plan_fft_forward(mean_samples);
    let weights: Vec<f64> = xf.iter().map(|f| f.sqrt()).collect();

    let per_stimulus: Vec<Vec<f64>> = stimuli
        .par_iter()
        .map(|s| stimulus_spectrum(&bank, &fft, &weights, s, compression, mean_samples))
        .collect::<Result<_>>()?;
    let per_stimulus = Array2::from_shape_vec((stimuli.len(), xf.len()), per_stimulus.concat())
        .map_err(|e| Error::input(e.to_string()))?;
    let corpus = rms_rows(&per_stimulus);

    let peak = corpus
        .iter()
        .zip(&in_range)
        .filter(|(_, keep)| **keep)
        .fold(0.0f64, |m, (&v, _)| m.max(v));
    if peak <= 0.0 {
        return Err(Error::input("modulation spectrum is zero inside the limits (silent corpus?)"));
    }

    let (freqs, spectrum) = xf
        .iter()
        .zip(&corpus)
        .zip(&in_range)
        .filter(|(_, keep)| **keep)
        .map(|((&f, &v), _)| (f, v / peak))
        .unzip();
    Ok(ModulationSpectrum { freqs, spectrum })
}

/// Reference length in samples: `floor(duration · sfreq)`, with the duration
/// taken from `fixed_duration` or else the corpus mean.
pub fn reference_length(stimuli: &[Waveform], sfreq: f64, fixed_duration: Option<f64>) -> Result<usize> {
    let duration = match fixed_duration {
        Some(d) => d,
        None if stimuli.is_empty() => return Err(Error::input("cannot average the duration of an empty corpus")),
        None => stimuli.iter().map(Waveform::duration).sum::<f64>() / stimuli.len() as f64,
    };
    if duration <= 0.0 {
        return Err(Error::config(format!("reference duration must be positive, got {duration} s")));
    }
    Ok((duration * sfreq).floor() as usize)
}

impl ModulationSpectrum {
    /// Two-column table `frequency_hz,amplitude`.
    pub fn write_csv<W: std::io::Write>(&self, mut w: W) -> anyhow::Result<()> {
        writeln!(w, "frequency_hz,amplitude")?;
        for (f, v) in self.freqs.iter().zip(&self.spectrum) {
            writeln!(w, "{f},{v}")?;
        }
        Ok(())
    }
}

/// Broadband envelopes of a corpus at the audio rate, one row per stimulus,
/// each fitted to `mean_samples`.  Rows are the mean of the compressed
/// subbands.
pub fn compute_envelopes(
    stimuli: &[Waveform],
    center_freqs: &[f64],
    sfreq: f64,
    mean_samples: usize,
    compression: f64,
) -> Result<Array2<f64>> {
    check_rates(stimuli, sfreq)?;
    let bank = GammatoneFilterbank::new(center_freqs, sfreq)?;
    let rows: Vec<Vec<f64>> = stimuli
        .par_iter()
        .map(|s| {
            let subbands = fitted_subbands(&bank, s, compression, mean_samples)?;
            Ok(subbands
                .mean_axis(Axis(0))
                .map_or_else(|| vec![0.0; mean_samples], |m| m.to_vec()))
        })
        .collect::<Result<_>>()?;
    Array2::from_shape_vec((stimuli.len(), mean_samples), rows.concat()).map_err(|e| Error::input(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn am_tone(rate: f64, secs: f64, sfreq: f64) -> Waveform {
        let n = (secs * sfreq) as usize;
        let x = (0..n)
            .map(|i| {
                let t = i as f64 / sfreq;
                (1.0 + 0.9 * (2.0 * PI * rate * t).sin()) * (2.0 * PI * 1000.0 * t).sin()
            })
            .collect();
        Waveform::from_mono(x, sfreq)
    }

    fn limits(low: f64, high: f64) -> SpectrumLimits {
        SpectrumLimits { low, high }
    }

    #[test]
    fn rfft_freqs_match_numpy() {
        assert_eq!(rfft_freqs(4, 8.0), vec![0.0, 2.0, 4.0]);
        assert_eq!(rfft_freqs(5, 10.0), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn peak_sits_at_modulation_rate() {
        let sfreq = 8000.0;
        let stimuli = vec![am_tone(4.0, 2.0, sfreq), am_tone(4.0, 1.5, sfreq)];
        let ms = compute_modulation_spectrum(&stimuli, &[800.0, 1000.0, 1250.0], sfreq, 16_000, 0.3, limits(0.5, 32.0))
            .unwrap();
        assert_eq!(ms.freqs.len(), ms.spectrum.len());
        assert!(ms.freqs.iter().all(|&f| (0.5..=32.0).contains(&f)));
        let (imax, &vmax) = ms
            .spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        approx::assert_abs_diff_eq!(vmax, 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(ms.freqs[imax], 4.0, epsilon = 0.5);
    }

    #[test]
    fn empty_corpus_is_input_error() {
        let err = compute_modulation_spectrum(&[], &[1000.0], 8000.0, 100, 0.3, limits(0.5, 32.0)).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn inverted_limits_are_configuration_error() {
        let stimuli = vec![am_tone(4.0, 0.5, 8000.0)];
        let err = compute_modulation_spectrum(&stimuli, &[1000.0], 8000.0, 4000, 0.3, limits(32.0, 0.5)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn stimulus_at_other_rate_is_input_error() {
        let stimuli = vec![am_tone(4.0, 0.5, 8000.0), am_tone(4.0, 0.5, 16_000.0)];
        let err = compute_modulation_spectrum(&stimuli, &[1000.0], 8000.0, 4000, 0.3, limits(0.5, 32.0)).unwrap_err();
        assert!(matches!(err, Error::Input(ref m) if m.contains("stimulus 1")), "{err}");
        assert!(matches!(compute_envelopes(&stimuli, &[1000.0], 8000.0, 4000, 0.3), Err(Error::Input(_))));
    }

    #[test]
    fn reference_length_uses_mean_duration() {
        let stimuli = vec![Waveform::from_mono(vec![0.0; 1000], 100.0), Waveform::from_mono(vec![0.0; 1500], 100.0)];
        assert_eq!(reference_length(&stimuli, 100.0, None).unwrap(), 1250);
        assert_eq!(reference_length(&stimuli, 100.0, Some(2.005)).unwrap(), 200);
        assert!(reference_length(&[], 100.0, None).is_err());
    }

    #[test]
    fn csv_has_two_columns() {
        let ms = ModulationSpectrum { freqs: vec![0.5, 1.0], spectrum: vec![1.0, 0.25] };
        let mut buf = Vec::new();
        ms.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "frequency_hz,amplitude\n0.5,1\n1,0.25\n");
    }

    #[test]
    fn envelopes_have_reference_length() {
        let stimuli = vec![am_tone(4.0, 0.5, 8000.0), am_tone(4.0, 0.25, 8000.0)];
        let env = compute_envelopes(&stimuli, &[1000.0], 8000.0, 3000, 0.3).unwrap();
        assert_eq!(env.dim(), (2, 3000));
        assert!(env.row(1).slice(ndarray::s![2000..]).iter().all(|&v| v == 0.0));
    }
}

mod common;
use common::am_tone;
use speechtrack::envelope::fit_length;
use speechtrack::gammatone::erb_space;
use speechtrack::modulation::{compute_envelopes, reference_length};
use speechtrack::{compute_modulation_spectrum, Error, SpectrumLimits, Waveform};

const SFREQ: f64 = 8000.0;

fn limits(low: f64, high: f64) -> SpectrumLimits {
    SpectrumLimits { low, high }
}

#[test]
fn spectrum_peak_is_one_inside_limits() {
    let cfs = erb_space(300.0, 3000.0, 6).unwrap();
    let corpora = [
        vec![am_tone(1000.0, 4.0, 1.0, SFREQ)],
        vec![am_tone(1000.0, 3.0, 1.0, SFREQ), am_tone(1500.0, 6.0, 0.8, SFREQ), am_tone(700.0, 5.0, 1.3, SFREQ)],
    ];
    for stimuli in &corpora {
        let n = reference_length(stimuli, SFREQ, None).unwrap();
        let ms = compute_modulation_spectrum(stimuli, &cfs, SFREQ, n, 0.3, limits(1.0, 16.0)).unwrap();
        let max = ms.spectrum.iter().cloned().fold(f64::MIN, f64::max);
        approx::assert_abs_diff_eq!(max, 1.0, epsilon = 1e-12);
        assert!(ms.spectrum.iter().all(|&v| v >= 0.0));
        assert!(ms.freqs.first().is_some_and(|&f| f >= 1.0));
        assert!(ms.freqs.last().is_some_and(|&f| f <= 16.0));
        assert!(ms.freqs.windows(2).all(|w| w[1] > w[0]));
    }
}

#[test]
fn faster_modulation_moves_the_peak() {
    let cfs = erb_space(300.0, 3000.0, 6).unwrap();
    let peak_of = |rate: f64| {
        let stimuli = vec![am_tone(1000.0, rate, 2.0, SFREQ)];
        let ms = compute_modulation_spectrum(&stimuli, &cfs, SFREQ, 16_000, 0.3, limits(0.5, 32.0)).unwrap();
        let (i, _) = ms
            .spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        ms.freqs[i]
    };
    approx::assert_abs_diff_eq!(peak_of(3.0), 3.0, epsilon = 0.5);
    approx::assert_abs_diff_eq!(peak_of(8.0), 8.0, epsilon = 0.5);
}

#[test]
fn fit_length_is_idempotent_at_reference_length() {
    let x: Vec<f64> = (0..50).map(|i| (i as f64).sin()).collect();
    assert_eq!(fit_length(&x, 50), x);
    assert_eq!(fit_length(&fit_length(&x, 80), 80), fit_length(&x, 80));
    assert_eq!(fit_length(&x, 20), x[..20].to_vec());
}

#[test]
fn silent_corpus_and_bad_limits() {
    let cfs = erb_space(300.0, 3000.0, 4).unwrap();
    let silent = vec![Waveform::from_mono(vec![0.0; 8000], SFREQ)];
    assert!(matches!(
        compute_modulation_spectrum(&silent, &cfs, SFREQ, 8000, 0.3, limits(0.5, 32.0)),
        Err(Error::Input(_))
    ));

    let tone = vec![am_tone(1000.0, 4.0, 1.0, SFREQ)];
    assert!(matches!(
        compute_modulation_spectrum(&tone, &cfs, SFREQ, 8000, 0.3, limits(4.0, 4.0)),
        Err(Error::Configuration(_))
    ));
    // 1 Hz resolution: nothing between 0.2 and 0.8 Hz.
    assert!(matches!(
        compute_modulation_spectrum(&tone, &cfs, SFREQ, 8000, 0.3, limits(0.2, 0.8)),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn stereo_stimulus_is_input_error() {
    let cfs = erb_space(300.0, 3000.0, 4).unwrap();
    let stereo = vec![Waveform::new(ndarray::Array2::zeros((2, 8000)), SFREQ)];
    assert!(matches!(
        compute_modulation_spectrum(&stereo, &cfs, SFREQ, 8000, 0.3, limits(0.5, 32.0)),
        Err(Error::Input(_))
    ));
}

#[test]
fn envelopes_follow_each_stimulus() {
    let cfs = erb_space(300.0, 3000.0, 4).unwrap();
    let stimuli = vec![am_tone(1000.0, 4.0, 1.0, SFREQ), am_tone(1000.0, 4.0, 0.5, SFREQ)];
    let env = compute_envelopes(&stimuli, &cfs, SFREQ, 6000, 0.3).unwrap();
    assert_eq!(env.dim(), (2, 6000));
    assert!(env.row(0).iter().all(|&v| v >= 0.0));
    assert!(env.row(1).iter().skip(4000).all(|&v| v == 0.0));
}

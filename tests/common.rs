/// Shared helpers: synthetic signals and epoch builders.
use ndarray::Array3;
use speechtrack::{Epochs, TrialMetadata, Waveform};
use std::f64::consts::PI;

#[allow(unused)]
/// `amp · sin(2π f t + phase)` sampled at `sfreq`.
pub fn sine(freq: f64, amp: f64, phase: f64, n: usize, sfreq: f64) -> Vec<f64> {
    (0..n)
        .map(|i| amp * (2.0 * PI * freq * i as f64 / sfreq + phase).sin())
        .collect()
}

#[allow(unused)]
/// Tone at `carrier` Hz, amplitude-modulated at `rate` Hz with depth 0.9.
pub fn am_tone(carrier: f64, rate: f64, secs: f64, sfreq: f64) -> Waveform {
    let n = (secs * sfreq) as usize;
    let x = (0..n)
        .map(|i| {
            let t = i as f64 / sfreq;
            (1.0 + 0.9 * (2.0 * PI * rate * t).sin()) * (2.0 * PI * carrier * t).sin()
        })
        .collect();
    Waveform::from_mono(x, sfreq)
}

#[allow(unused)]
/// Epochs whose every channel carries `signal(trial, channel, t_seconds)`.
pub fn synthetic_epochs(
    ids: &[&str],
    ch_names: &[&str],
    sfreq: f64,
    tmin: f64,
    n_times: usize,
    signal: impl Fn(usize, usize, f64) -> f64,
) -> Epochs {
    let data = Array3::from_shape_fn((ids.len(), ch_names.len(), n_times), |(e, c, i)| {
        signal(e, c, tmin + i as f64 / sfreq)
    });
    let metadata = ids
        .iter()
        .enumerate()
        .map(|(i, id)| TrialMetadata::new(i, id, true))
        .collect();
    Epochs::new(data, ch_names.iter().map(|s| s.to_string()).collect(), sfreq, tmin, metadata)
        .expect("consistent synthetic epochs")
}

#[allow(unused)]
/// Maximum absolute difference between two slices.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}

#[allow(unused)]
/// Absolute angular distance between two phases, wrapped to [0, π].
pub fn circular_distance(a: f64, b: f64) -> f64 {
    let d = a - b;
    d.sin().atan2(d.cos()).abs()
}

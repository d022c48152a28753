//! Zero-phase IIR filtering, matching `scipy.signal.sosfiltfilt` /
//! `filtfilt` with their default odd padding.
//!
//! The signal is extended by odd reflection on both sides, filtered forward
//! with steady-state initial conditions scaled to the first sample, then
//! filtered backward the same way.  The padding is stripped afterwards, so
//! the output has the input's length and no phase shift.
use super::Sos;

/// Filter `x` forward and backward through the second-order sections `sos`.
pub fn sosfiltfilt(sos: &[Sos], x: &[f64]) -> Vec<f64> {
    if x.is_empty() || sos.is_empty() {
        return x.to_vec();
    }
    let zero_b2 = sos.iter().filter(|s| s[2] == 0.0).count();
    let zero_a2 = sos.iter().filter(|s| s[5] == 0.0).count();
    let ntaps = 2 * sos.len() + 1 - zero_b2.min(zero_a2);
    let padlen = (3 * ntaps).min(x.len() - 1);

    let zi = sosfilt_zi(sos);
    run_both_ways(x, padlen, |signal| {
        let x0 = signal[0];
        let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect();
        sosfilt(sos, signal, &mut state)
    })
}

/// Filter `x` forward and backward through the transfer function `(b, a)`.
pub fn filtfilt(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return vec![];
    }
    let padlen = (3 * b.len().max(a.len())).min(x.len() - 1);
    let (b, a) = normalize_ba(b, a);
    let zi = lfilter_zi(&b, &a);
    run_both_ways(x, padlen, |signal| {
        let x0 = signal[0];
        let mut state: Vec<f64> = zi.iter().map(|z| z * x0).collect();
        lfilter(&b, &a, signal, &mut state)
    })
}

fn run_both_ways<F>(x: &[f64], padlen: usize, pass: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let ext = odd_extend(x, padlen);
    let mut y = pass(&ext);
    y.reverse();
    let mut y = pass(&y);
    y.reverse();
    y[padlen..padlen + x.len()].to_vec()
}

/// Cascade of transposed direct-form II biquads.  `state[s]` holds the two
/// delay elements of section `s` and is updated in place.
pub fn sosfilt(sos: &[Sos], x: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
    x.iter()
        .map(|&v| {
            let mut cur = v;
            for (s, z) in sos.iter().zip(state.iter_mut()) {
                let y = s[0] * cur + z[0];
                z[0] = s[1] * cur - s[4] * y + z[1];
                z[1] = s[2] * cur - s[5] * y;
                cur = y;
            }
            cur
        })
        .collect()
}

/// Transposed direct-form II filter of arbitrary order (`a[0] == 1`).
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], state: &mut [f64]) -> Vec<f64> {
    let n = state.len();
    x.iter()
        .map(|&v| {
            let y = b[0] * v + state.first().copied().unwrap_or(0.0);
            for k in 0..n {
                let next = if k + 1 < n { state[k + 1] } else { 0.0 };
                state[k] = b[k + 1] * v - a[k + 1] * y + next;
            }
            y
        })
        .collect()
}

/// Steady-state delay values of `(b, a)` for a unit step input.
///
/// With DC gain `g = Σb / Σa`, the delays of the transposed form settle at
/// `z_k = Σ_{j>k} (b_j − a_j·g)`.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Vec<f64> {
    let n = b.len().max(a.len());
    if n < 2 {
        return vec![];
    }
    let g = b.iter().sum::<f64>() / a.iter().sum::<f64>();
    let coef = |v: &[f64], j: usize| v.get(j).copied().unwrap_or(0.0);
    let mut zi = vec![0.0; n - 1];
    let mut acc = 0.0;
    for k in (0..n - 1).rev() {
        acc += coef(b, k + 1) - coef(a, k + 1) * g;
        zi[k] = acc;
    }
    zi
}

/// Per-section steady-state delays, each scaled by the DC gain of the
/// sections before it (`scipy.signal.sosfilt_zi`).
pub fn sosfilt_zi(sos: &[Sos]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    sos.iter()
        .map(|s| {
            let zi = lfilter_zi(&s[..3], &s[3..]);
            let out = [scale * zi[0], scale * zi[1]];
            scale *= (s[0] + s[1] + s[2]) / (s[3] + s[4] + s[5]);
            out
        })
        .collect()
}

fn normalize_ba(b: &[f64], a: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = b.len().max(a.len());
    let a0 = a[0];
    let mut bn: Vec<f64> = b.iter().map(|v| v / a0).collect();
    let mut an: Vec<f64> = a.iter().map(|v| v / a0).collect();
    bn.resize(n, 0.0);
    an.resize(n, 0.0);
    (bn, an)
}

/// Odd extension (matches `scipy.signal._arraytools.odd_ext` and MNE's
/// reflect-limited `_smart_pad`).
///
/// Left:  `pad[i] = 2*x[0] - x[n-i]`   for i in 1..=n
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]` for i in 1..=n
pub(crate) fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let n = n.min(len.saturating_sub(1));
    let mut out = Vec::with_capacity(len + 2 * n);
    for i in (1..=n).rev() {
        out.push(2.0 * x[0] - x[i]);
    }
    out.extend_from_slice(x);
    let last = x[len - 1];
    for i in 1..=n {
        out.push(2.0 * last - x[len - 1 - i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{design_butter, sos_to_ba, Passband};

    #[test]
    fn odd_extend_left_and_right() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let padded = odd_extend(&x, 3);
        // left: 2*1 - 4 → -2, 2*1 - 3 → -1, 2*1 - 2 → 0
        assert_eq!(&padded[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&padded[3..8], &x[..]);
        // right: 2*5 - 4 → 6, 2*5 - 3 → 7, 2*5 - 2 → 8
        assert_eq!(&padded[8..], &[6.0, 7.0, 8.0]);
    }

    #[test]
    fn odd_extend_clamps_to_signal() {
        assert_eq!(odd_extend(&[1.0, 2.0], 10).len(), 4);
        assert_eq!(odd_extend(&[3.0], 10), vec![3.0]);
    }

    #[test]
    fn step_response_starts_in_steady_state() {
        let sos = design_butter(4, Passband::Lowpass(10.0), 256.0).unwrap();
        let x = vec![2.5; 64];
        let mut state: Vec<[f64; 2]> =
            sosfilt_zi(&sos).iter().map(|z| [z[0] * 2.5, z[1] * 2.5]).collect();
        let y = sosfilt(&sos, &x, &mut state);
        for v in y {
            approx::assert_abs_diff_eq!(v, 2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn filtfilt_preserves_length_and_constant() {
        let sos = design_butter(4, Passband::Lowpass(10.0), 256.0).unwrap();
        let x = vec![1.0; 300];
        let y = sosfiltfilt(&sos, &x);
        assert_eq!(y.len(), x.len());
        for v in y {
            approx::assert_abs_diff_eq!(v, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_phase_keeps_peak_in_place() {
        let sos = design_butter(2, Passband::Lowpass(20.0), 256.0).unwrap();
        let mut x = vec![0.0; 257];
        x[128] = 1.0;
        let y = sosfiltfilt(&sos, &x);
        let peak = y
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 128);
    }

    #[test]
    fn ba_and_sos_agree_for_low_order() {
        let sos = design_butter(2, Passband::Bandpass(4.0, 12.0), 128.0).unwrap();
        let (b, a) = sos_to_ba(&sos);
        let x: Vec<f64> = (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 8.0 * i as f64 / 128.0).sin() + 0.3)
            .collect();
        let y_sos = sosfiltfilt(&sos, &x);
        let y_ba = filtfilt(&b, &a, &x);
        // Interior only; the two forms pad by different amounts.
        for i in 100..412 {
            approx::assert_abs_diff_eq!(y_sos[i], y_ba[i], epsilon = 1e-6);
        }
    }
}

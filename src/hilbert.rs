//! Analytic signal and instantaneous phase (`scipy.signal.hilbert`
//! semantics, any length, no padding).
//!
//! The analytic signal is `a(t) = x(t) + i·H[x(t)]`, obtained by zeroing the
//! negative-frequency half of the spectrum and doubling the positive half.
//! Its angle is only meaningful for narrowband input, so callers band-pass
//! filter first.
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Analytic signal of `x`, same length.
pub fn analytic_signal(x: &[f64]) -> Vec<Complex64> {
    let n = x.len();
    if n == 0 {
        return vec![];
    }
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let mut buf: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut buf);

    // h[0] = 1; h[1..n/2] = 2; h[n/2] = 1 for even n; the rest 0.
    let half = n.div_ceil(2);
    for v in buf.iter_mut().take(half).skip(1) {
        *v *= 2.0;
    }
    let zero_from = if n % 2 == 0 { n / 2 + 1 } else { half };
    for v in buf.iter_mut().skip(zero_from) {
        *v = Complex64::default();
    }

    planner.plan_fft_inverse(n).process(&mut buf);
    let inv = 1.0 / n as f64;
    buf.iter_mut().for_each(|v| *v *= inv);
    buf
}

/// Instantaneous phase of `x` in (−π, π].
pub fn instantaneous_phase(x: &[f64]) -> Vec<f64> {
    analytic_signal(x)
        .iter()
        .map(|c| {
            // atan2 yields −π for a negative real axis with −0.0 imaginary part.
            let p = c.arg();
            if p <= -std::f64::consts::PI { p + 2.0 * std::f64::consts::PI } else { p }
        })
        .collect()
}

/// Instantaneous amplitude (Hilbert envelope) of `x`.
pub fn instantaneous_amplitude(x: &[f64]) -> Vec<f64> {
    analytic_signal(x).iter().map(|c| c.norm()).collect()
}

//! Butterworth IIR design matching `scipy.signal.butter(..., output='sos')`.
//!
//! Design path:
//!   • analog prototype poles  p_k = −exp(iπm / 2N),  m = −N+1, −N+3, …, N−1
//!   • pre-warp the band edges: w = 4·tan(π·Wn / 2)  (fs = 2 convention)
//!   • lowpass / highpass / bandpass frequency transform
//!   • bilinear transform, zeros at infinity mapped to z = −1
//!   • pair conjugate poles and zeros into second-order sections
use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use super::{Passband, Sos};
use crate::error::{Error, Result};

/// Design a Butterworth filter of the given analog `order` as second-order
/// sections `[b0, b1, b2, 1, a1, a2]`.
///
/// A bandpass of order `N` has `2N` poles and therefore `N` sections;
/// low/highpass designs have `ceil(N / 2)` sections.
pub fn design_butter(order: usize, band: Passband, sfreq: f64) -> Result<Vec<Sos>> {
    if order == 0 {
        return Err(Error::config("filter order must be at least 1"));
    }
    let nyq = sfreq / 2.0;
    let check = |f: f64| -> Result<f64> {
        if f <= 0.0 || f >= nyq {
            return Err(Error::config(format!(
                "cutoff {f} Hz outside (0, {nyq}) for sfreq {sfreq} Hz"
            )));
        }
        Ok(4.0 * (PI * (f / nyq) / 2.0).tan())
    };

    let proto = butter_prototype(order);
    let (zeros, poles, gain) = match band {
        Passband::Lowpass(fc) => {
            let wo = check(fc)?;
            let p: Vec<Complex64> = proto.iter().map(|&p| p * wo).collect();
            (vec![], p, wo.powi(order as i32))
        }
        Passband::Highpass(fc) => {
            let wo = check(fc)?;
            let p: Vec<Complex64> = proto.iter().map(|&p| wo / p).collect();
            let prod_neg_p: Complex64 = proto.iter().map(|&p| -p).product();
            let k = (Complex64::new(1.0, 0.0) / prod_neg_p).re;
            (vec![Complex64::default(); order], p, k)
        }
        Passband::Bandpass(lo, hi) => {
            if lo >= hi {
                return Err(Error::config(format!(
                    "bandpass low edge {lo} Hz must be below high edge {hi} Hz"
                )));
            }
            let (w1, w2) = (check(lo)?, check(hi)?);
            let bw = w2 - w1;
            let wo = (w1 * w2).sqrt();
            let mut p = Vec::with_capacity(2 * order);
            for &pp in &proto {
                let p_lp = pp * (bw / 2.0);
                let root = (p_lp * p_lp - wo * wo).sqrt();
                p.push(p_lp + root);
                p.push(p_lp - root);
            }
            (vec![Complex64::default(); order], p, bw.powi(order as i32))
        }
    };

    let (zd, pd, kd) = bilinear_zpk(&zeros, &poles, gain);
    Ok(zpk_to_sos(&zd, &pd, kd))
}

/// Analog Butterworth prototype poles (unit cutoff, unit gain).
fn butter_prototype(order: usize) -> Vec<Complex64> {
    let n = order as i64;
    (0..order as i64)
        .map(|j| {
            let m = -n + 1 + 2 * j;
            -Complex64::from_polar(1.0, PI * m as f64 / (2.0 * n as f64))
        })
        .collect()
}

/// Bilinear transform with `fs = 2`.
fn bilinear_zpk(z: &[Complex64], p: &[Complex64], k: f64) -> (Vec<f64>, Vec<Complex64>, f64) {
    let fs2 = Complex64::new(4.0, 0.0);
    let mut zd: Vec<f64> = z.iter().map(|&z| ((fs2 + z) / (fs2 - z)).re).collect();
    let pd: Vec<Complex64> = p.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    zd.extend(std::iter::repeat(-1.0).take(p.len() - z.len()));

    let num: Complex64 = z.iter().map(|&z| fs2 - z).product();
    let den: Complex64 = p.iter().map(|&p| fs2 - p).product();
    (zd, pd, k * (num / den).re)
}

/// Group poles and (real) zeros into biquads.
///
/// Complex poles are paired with their conjugates, least resonant first.
/// Zeros are paired largest-with-smallest, so a bandpass section gets one
/// zero at `+1` and one at `−1`.  The overall gain goes into the first
/// section.
fn zpk_to_sos(zeros: &[f64], poles: &[Complex64], gain: f64) -> Vec<Sos> {
    const IM_TOL: f64 = 1e-12;

    let mut complex: Vec<Complex64> = poles.iter().copied().filter(|p| p.im > IM_TOL).collect();
    complex.sort_by(|a, b| a.norm().total_cmp(&b.norm()));
    let mut real: Vec<f64> = poles.iter().filter(|p| p.im.abs() <= IM_TOL).map(|p| p.re).collect();
    real.sort_by(|a, b| a.total_cmp(b));

    let mut den: Vec<[f64; 3]> = real
        .chunks(2)
        .map(|c| match c {
            [a, b] => [1.0, -(a + b), a * b],
            [a] => [1.0, -a, 0.0],
            _ => unreachable!(),
        })
        .collect();
    den.extend(complex.iter().map(|p| [1.0, -2.0 * p.re, p.norm_sqr()]));

    let mut zs = zeros.to_vec();
    zs.sort_by(|a, b| b.total_cmp(a));
    let mut num = Vec::with_capacity(den.len());
    let (mut lo, mut hi) = (0usize, zs.len());
    while lo < hi {
        if hi - lo == 1 {
            num.push([1.0, -zs[lo], 0.0]);
            break;
        }
        let (a, b) = (zs[lo], zs[hi - 1]);
        num.push([1.0, -(a + b), a * b]);
        lo += 1;
        hi -= 1;
    }
    num.resize(den.len(), [1.0, 0.0, 0.0]);

    let mut sos: Vec<Sos> = num
        .iter()
        .zip(den.iter())
        .map(|(b, a)| [b[0], b[1], b[2], a[0], a[1], a[2]])
        .collect();
    if let Some(first) = sos.first_mut() {
        first[0] *= gain;
        first[1] *= gain;
        first[2] *= gain;
    }
    sos
}

/// Magnitude response `|H(e^{jω})|` of a cascade at `freq` Hz.
pub fn sos_gain(sos: &[Sos], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let z1 = Complex64::from_polar(1.0, -w);
    let z2 = z1 * z1;
    sos.iter()
        .map(|s| {
            let num = s[0] + s[1] * z1 + s[2] * z2;
            let den = s[3] + s[4] * z1 + s[5] * z2;
            (num / den).norm()
        })
        .product()
}

/// Merge a cascade into a single transfer function `(b, a)`.
pub fn sos_to_ba(sos: &[Sos]) -> (Vec<f64>, Vec<f64>) {
    let mut b = vec![1.0];
    let mut a = vec![1.0];
    for s in sos {
        b = poly_mul(&b, &s[..3]);
        a = poly_mul(&a, &s[3..]);
    }
    (b, a)
}

fn poly_mul(p: &[f64], q: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; p.len() + q.len() - 1];
    for (i, &pi) in p.iter().enumerate() {
        for (j, &qj) in q.iter().enumerate() {
            out[i + j] += pi * qj;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_counts() {
        assert_eq!(design_butter(4, Passband::Bandpass(1.0, 8.0), 512.0).unwrap().len(), 4);
        assert_eq!(design_butter(4, Passband::Lowpass(40.0), 512.0).unwrap().len(), 2);
        assert_eq!(design_butter(3, Passband::Highpass(1.0), 512.0).unwrap().len(), 2);
    }

    #[test]
    fn lowpass_unity_dc_and_half_power_at_cutoff() {
        let sos = design_butter(4, Passband::Lowpass(40.0), 512.0).unwrap();
        approx::assert_abs_diff_eq!(sos_gain(&sos, 0.0, 512.0), 1.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(
            sos_gain(&sos, 40.0, 512.0),
            std::f64::consts::FRAC_1_SQRT_2,
            epsilon = 1e-6
        );
        assert!(sos_gain(&sos, 200.0, 512.0) < 1e-3);
    }

    #[test]
    fn highpass_blocks_dc() {
        let sos = design_butter(2, Passband::Highpass(1.0), 256.0).unwrap();
        assert!(sos_gain(&sos, 0.0, 256.0) < 1e-9);
        approx::assert_abs_diff_eq!(sos_gain(&sos, 100.0, 256.0), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn bandpass_edges_at_half_power() {
        let sos = design_butter(4, Passband::Bandpass(4.0, 8.0), 512.0).unwrap();
        let centre = sos_gain(&sos, (4.0f64 * 8.0).sqrt(), 512.0);
        approx::assert_abs_diff_eq!(centre, 1.0, epsilon = 1e-6);
        for edge in [4.0, 8.0] {
            approx::assert_abs_diff_eq!(
                sos_gain(&sos, edge, 512.0),
                std::f64::consts::FRAC_1_SQRT_2,
                epsilon = 1e-6
            );
        }
        assert!(sos_gain(&sos, 0.0, 512.0) < 1e-9);
        assert!(sos_gain(&sos, 40.0, 512.0) < 1e-3);
    }

    #[test]
    fn poles_inside_unit_circle() {
        let sos = design_butter(6, Passband::Bandpass(0.5, 1.3), 512.0).unwrap();
        for s in &sos {
            // |p|² = a2 for a conjugate pair; stability needs a2 < 1.
            assert!(s[5].abs() < 1.0, "unstable section {s:?}");
        }
    }

    #[test]
    fn ba_matches_sos_response() {
        let sos = design_butter(2, Passband::Bandpass(2.0, 6.0), 128.0).unwrap();
        let (b, a) = sos_to_ba(&sos);
        assert_eq!(b.len(), 5);
        assert_eq!(a.len(), 5);
        approx::assert_abs_diff_eq!(a[0], 1.0);
        // Zeros at ±1: no DC and no Nyquist.
        let dc: f64 = b.iter().sum();
        let nyq: f64 = b.iter().enumerate().map(|(i, v)| if i % 2 == 0 { *v } else { -v }).sum();
        assert!(dc.abs() < 1e-12);
        assert!(nyq.abs() < 1e-12);
    }

    #[test]
    fn invalid_cutoffs_rejected() {
        assert!(design_butter(4, Passband::Lowpass(300.0), 512.0).is_err());
        assert!(design_butter(4, Passband::Bandpass(8.0, 4.0), 512.0).is_err());
        assert!(design_butter(0, Passband::Lowpass(10.0), 512.0).is_err());
    }
}

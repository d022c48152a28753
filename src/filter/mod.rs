//! IIR filter design and zero-phase application.
//!
//! - [`iir`]: Butterworth design as second-order sections, matching
//!   `scipy.signal.butter(..., output='sos')`.
//! - [`apply`]: forward-backward filtering with odd padding and steady-state
//!   initial conditions, matching `sosfiltfilt` / `filtfilt`.
//!
//! [`filter_data`] ties both together the way `mne.filter.filter_data(...,
//! method='iir')` is called by the tracking and evoked stages.

pub mod apply;
pub mod iir;

pub use apply::{filtfilt, lfilter, lfilter_zi, sosfilt, sosfilt_zi, sosfiltfilt};
pub use iir::{design_butter, sos_gain, sos_to_ba};

use crate::config::IirParams;
use crate::error::{Error, Result};

/// One second-order section `[b0, b1, b2, a0, a1, a2]` with `a0 == 1`.
pub type Sos = [f64; 6];

/// Which side(s) of the spectrum a design keeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Passband {
    Lowpass(f64),
    Highpass(f64),
    Bandpass(f64, f64),
}

impl Passband {
    /// Map the `(l_freq, h_freq)` pair of the source calls onto a band.
    /// `(None, None)` means "no filtering".
    pub fn from_edges(l_freq: Option<f64>, h_freq: Option<f64>) -> Option<Self> {
        match (l_freq, h_freq) {
            (None, None) => None,
            (None, Some(h)) => Some(Passband::Lowpass(h)),
            (Some(l), None) => Some(Passband::Highpass(l)),
            (Some(l), Some(h)) => Some(Passband::Bandpass(l, h)),
        }
    }
}

/// Form in which the designed filter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IirForm {
    /// Cascade of second-order sections.
    Sos,
    /// Single transfer function; less stable at high orders or narrow bands.
    Ba,
}

/// Zero-phase IIR filter of a 1-D signal.
///
/// `l_freq` / `h_freq` follow MNE: `(None, Some(h))` is a lowpass,
/// `(Some(l), None)` a highpass and `(Some(l), Some(h))` a bandpass.
/// The output has the same length as `x`.
///
/// # Errors
///
/// [`Error::Configuration`] for an unsupported filter family/form, a zero
/// order, or band edges outside `(0, sfreq / 2)` or in the wrong order.
pub fn filter_data(
    x: &[f64],
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    params: &IirParams,
) -> Result<Vec<f64>> {
    let form = params.form()?;
    let Some(band) = Passband::from_edges(l_freq, h_freq) else {
        return Ok(x.to_vec());
    };
    if let Passband::Bandpass(l, h) = band {
        if l >= h {
            return Err(Error::config(format!("freq_min ({l}) must be below freq_max ({h})")));
        }
    }
    let sos = design_butter(params.order, band, sfreq)?;
    Ok(match form {
        IirForm::Sos => sosfiltfilt(&sos, x),
        IirForm::Ba => {
            let (b, a) = sos_to_ba(&sos);
            filtfilt(&b, &a, x)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_edges_is_identity() {
        let x = vec![1.0, -2.0, 3.0];
        let y = filter_data(&x, 100.0, None, None, &IirParams::default()).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn inverted_band_is_configuration_error() {
        let x = vec![0.0; 100];
        let err = filter_data(&x, 100.0, Some(8.0), Some(4.0), &IirParams::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn bandpass_removes_offset() {
        let sfreq = 128.0;
        let x: Vec<f64> = (0..1024)
            .map(|i| 5.0 + (2.0 * std::f64::consts::PI * 6.0 * i as f64 / sfreq).sin())
            .collect();
        let y = filter_data(&x, sfreq, Some(4.0), Some(8.0), &IirParams::default()).unwrap();
        let interior = &y[256..768];
        let mean = interior.iter().sum::<f64>() / interior.len() as f64;
        assert!(mean.abs() < 0.05, "offset survived: {mean}");
        let peak = interior.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak > 0.8 && peak < 1.1, "passband amplitude {peak}");
    }
}

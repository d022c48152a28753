mod common;
use common::{max_abs_diff, sine};
use speechtrack::config::IirParams;
use speechtrack::filter::{design_butter, filter_data, sos_gain, Passband};
use speechtrack::Error;

// ── Design tests ──────────────────────────────────────────────────────────────

#[test]
fn lowpass_response_shape() {
    let sos = design_butter(4, Passband::Lowpass(10.0), 128.0).unwrap();
    approx::assert_abs_diff_eq!(sos_gain(&sos, 0.0, 128.0), 1.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(sos_gain(&sos, 10.0, 128.0), std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    assert!(sos_gain(&sos, 40.0, 128.0) < 1e-2, "stopband leak");
}

#[test]
fn bandpass_is_flat_inside_and_steep_outside() {
    let sos = design_butter(4, Passband::Bandpass(3.5, 7.0), 128.0).unwrap();
    let mid = sos_gain(&sos, 5.0, 128.0);
    assert!(mid > 0.95 && mid < 1.0 + 1e-9, "passband gain {mid}");
    assert!(sos_gain(&sos, 0.5, 128.0) < 1e-2);
    assert!(sos_gain(&sos, 30.0, 128.0) < 1e-2);
}

// ── Application tests ─────────────────────────────────────────────────────────

#[test]
fn passband_sine_survives_without_phase_shift() {
    // Forward-backward filtering: a 5 Hz tone inside a 3.5–7 Hz band keeps
    // its phase, so interior samples match the input closely.
    let sfreq = 128.0;
    let x = sine(5.0, 1.0, 0.3, 2048, sfreq);
    let y = filter_data(&x, sfreq, Some(3.5), Some(7.0), &IirParams::default()).unwrap();
    assert_eq!(y.len(), x.len());
    let err = max_abs_diff(&x[512..1536], &y[512..1536]);
    assert!(err < 0.1, "max interior deviation {err:.3}");
}

#[test]
fn stopband_sine_is_removed() {
    let sfreq = 512.0;
    let slow = sine(0.2, 1.0, 0.0, 8192, sfreq);
    let fast = sine(40.0, 1.0, 0.0, 8192, sfreq);
    let x: Vec<f64> = slow.iter().zip(&fast).map(|(a, b)| a + b).collect();
    let y = filter_data(&x, sfreq, None, Some(10.0), &IirParams::default()).unwrap();
    let err = max_abs_diff(&slow[1024..7168], &y[1024..7168]);
    assert!(err < 0.02, "40 Hz residue {err:.4}");
}

#[test]
fn ba_and_sos_outputs_agree() {
    let sfreq = 256.0;
    let x = sine(3.0, 1.0, 0.0, 1024, sfreq);
    let sos = IirParams::default();
    let ba = IirParams { output: "ba".into(), ..IirParams::default() };
    let y_sos = filter_data(&x, sfreq, None, Some(20.0), &sos).unwrap();
    let y_ba = filter_data(&x, sfreq, None, Some(20.0), &ba).unwrap();
    assert!(max_abs_diff(&y_sos, &y_ba) < 1e-8);
}

#[test]
fn unknown_family_is_configuration_error() {
    let params = IirParams { ftype: "cheby1".into(), ..IirParams::default() };
    let err = filter_data(&[0.0; 64], 128.0, Some(1.0), Some(4.0), &params).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let params = IirParams { output: "zpk".into(), ..IirParams::default() };
    assert!(matches!(
        filter_data(&[0.0; 64], 128.0, Some(1.0), Some(4.0), &params),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn cutoff_at_nyquist_is_configuration_error() {
    let err = filter_data(&[0.0; 64], 128.0, None, Some(64.0), &IirParams::default()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

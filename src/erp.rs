//! ERP component measures: peak latency and mean amplitude around the peak.
//!
//! Both tables work on a channel-cluster average of an [`Evoked`]:
//!
//! * AEP: P1 (positive), N1 (negative) and P2 (positive) in their own
//!   windows of the onset-locked response.
//! * N400: the negative peak of the random-condition response; the mean
//!   amplitude at that latency is read from both the random and the context
//!   responses.
//!
//! Latencies are reported in whole milliseconds (ties to even, like numpy),
//! amplitudes in µV.
use std::io::Write;
use std::str::FromStr;

use ndarray::Array2;

use crate::config::{AepParams, N400Params};
use crate::epoch::Evoked;
use crate::error::{Error, Result};

const S_TO_MS: f64 = 1e3;
const V_TO_UV: f64 = 1e6;

/// Sign of the deflection a component is searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

impl FromStr for Polarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positive" => Ok(Polarity::Positive),
            "negative" => Ok(Polarity::Negative),
            other => Err(Error::config(format!(
                "polarity must be `positive` or `negative`, got `{other}`"
            ))),
        }
    }
}

/// Mean over the rows of `data` named in `cluster`.
///
/// # Errors
///
/// [`Error::Input`] for an empty cluster or a channel missing from
/// `ch_names`.
pub fn cluster_signal<S: AsRef<str>>(data: &Array2<f64>, ch_names: &[String], cluster: &[S]) -> Result<Vec<f64>> {
    if cluster.is_empty() {
        return Err(Error::input("channel cluster is empty"));
    }
    let mut sum = vec![0.0; data.ncols()];
    for name in cluster {
        let name = name.as_ref();
        let idx = ch_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::input(format!("channel `{name}` not in recording")))?;
        for (s, &v) in sum.iter_mut().zip(data.row(idx)) {
            *s += v;
        }
    }
    let n = cluster.len() as f64;
    Ok(sum.into_iter().map(|s| s / n).collect())
}

/// Time and absolute index of the extremum of `signal` inside `window`.
///
/// The search covers every sample with `window[0] <= t <= window[1]`; ties
/// resolve to the earliest sample.
///
/// # Errors
///
/// * [`Error::Input`] if `signal` and `times` differ in length or no sample
///   falls inside the window.
/// * [`Error::Configuration`] if `window[0] > window[1]`.
pub fn find_peak(signal: &[f64], times: &[f64], window: [f64; 2], polarity: Polarity) -> Result<(f64, usize)> {
    if signal.len() != times.len() {
        return Err(Error::input(format!(
            "{} samples but {} time points",
            signal.len(),
            times.len()
        )));
    }
    let [start, end] = window;
    if start > end {
        return Err(Error::config(format!("peak window [{start}, {end}] is inverted")));
    }
    let first = times.iter().position(|&t| t >= start);
    let last = times.iter().rposition(|&t| t <= end);
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) if f <= l => (f, l),
        _ => {
            return Err(Error::input(format!("no samples inside peak window [{start}, {end}] s")));
        }
    };

    let better = |candidate: f64, best: f64| match polarity {
        Polarity::Positive => candidate > best,
        Polarity::Negative => candidate < best,
    };
    let mut idx = first;
    for i in first + 1..=last {
        if better(signal[i], signal[idx]) {
            idx = i;
        }
    }
    Ok((times[idx], idx))
}

/// Mean of `signal` over `[peak - w, peak + w)` samples, where
/// `w = trunc(half_window * sfreq)` and `peak` is the sample at `peak_time`.
///
/// A constant signal yields its value for every `w >= 1`.  A half-window
/// shorter than one sample (`w == 0`) would average an empty slice and is
/// rejected instead of returning NaN.
///
/// # Errors
///
/// [`Error::Input`] if `peak_time` is not on the time grid, `w` is zero, or
/// the window reaches past either end of the signal.
pub fn mean_amplitude_around_peak(
    signal: &[f64],
    times: &[f64],
    peak_time: f64,
    sfreq: f64,
    half_window: f64,
) -> Result<f64> {
    let tol = 0.5 / sfreq;
    let peak = times
        .iter()
        .position(|&t| (t - peak_time).abs() < tol)
        .ok_or_else(|| Error::input(format!("peak time {peak_time} s is not on the time grid")))?;
    let w = (half_window * sfreq) as usize;
    if w == 0 {
        return Err(Error::input(format!(
            "averaging half-window {half_window} s is shorter than one sample at {sfreq} Hz"
        )));
    }
    if w > peak || peak + w > signal.len() {
        return Err(Error::input(format!(
            "averaging window ±{w} samples around sample {peak} leaves the signal (0..{})",
            signal.len()
        )));
    }
    let slice = &signal[peak - w..peak + w];
    Ok(slice.iter().sum::<f64>() / slice.len() as f64)
}

fn latency_ms(peak_time: f64) -> i64 {
    (peak_time * S_TO_MS).round_ties_even() as i64
}

// ── AEP ─────────────────────────────────────────────────────────────────────

/// Latency and amplitude of one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentMeasure {
    pub latency_ms: i64,
    pub amplitude_uv: f64,
}

fn measure(
    signal: &[f64],
    times: &[f64],
    sfreq: f64,
    window: [f64; 2],
    polarity: Polarity,
    half_window: f64,
) -> Result<ComponentMeasure> {
    let (peak_time, _) = find_peak(signal, times, window, polarity)?;
    let amp = mean_amplitude_around_peak(signal, times, peak_time, sfreq, half_window)?;
    Ok(ComponentMeasure { latency_ms: latency_ms(peak_time), amplitude_uv: amp * V_TO_UV })
}

/// One participant's row of the AEP table.
#[derive(Debug, Clone, PartialEq)]
pub struct AepRow {
    pub participant_id: String,
    pub p1: ComponentMeasure,
    pub n1: ComponentMeasure,
    pub p2: ComponentMeasure,
}

/// P1, N1 and P2 of the cluster average of an onset-locked response.
pub fn aep_row(participant_id: &str, evoked: &Evoked, params: &AepParams) -> Result<AepRow> {
    let signal = cluster_signal(evoked.data(), evoked.ch_names(), params.cluster.as_slice())?;
    let times = evoked.times();
    let sfreq = evoked.sfreq();
    let area = params.window_area;
    Ok(AepRow {
        participant_id: participant_id.to_string(),
        p1: measure(&signal, &times, sfreq, params.p1_window, Polarity::Positive, area)?,
        n1: measure(&signal, &times, sfreq, params.n1_window, Polarity::Negative, area)?,
        p2: measure(&signal, &times, sfreq, params.p2_window, Polarity::Positive, area)?,
    })
}

/// Write the AEP table.  `columns` names the seven columns: participant,
/// then latency/amplitude for P1, N1 and P2.
pub fn write_aep_csv<W: Write>(mut w: W, columns: &[String], rows: &[AepRow]) -> anyhow::Result<()> {
    anyhow::ensure!(columns.len() == 7, "AEP table needs 7 column names, got {}", columns.len());
    writeln!(w, "{}", columns.join(","))?;
    for r in rows {
        writeln!(
            w,
            "{},{},{},{},{},{},{}",
            r.participant_id,
            r.p1.latency_ms,
            r.p1.amplitude_uv,
            r.n1.latency_ms,
            r.n1.amplitude_uv,
            r.p2.latency_ms,
            r.p2.amplitude_uv
        )?;
    }
    Ok(())
}

// ── N400 ────────────────────────────────────────────────────────────────────

/// One participant's N400 latency with both condition amplitudes.
#[derive(Debug, Clone, PartialEq)]
pub struct N400Row {
    pub participant_id: String,
    pub latency_ms: i64,
    pub random_uv: f64,
    pub context_uv: f64,
}

/// N400 from the random-condition peak, read out in both conditions.
///
/// # Errors
///
/// [`Error::Input`] if the two responses do not share a time axis.
pub fn n400_row(participant_id: &str, random: &Evoked, context: &Evoked, params: &N400Params) -> Result<N400Row> {
    let times = random.times();
    if context.times().len() != times.len() || (context.tmin() - random.tmin()).abs() > 0.5 / random.sfreq() {
        return Err(Error::input(format!(
            "{participant_id}: context and random responses cover different time axes"
        )));
    }
    let sfreq = random.sfreq();
    let random_sig = cluster_signal(random.data(), random.ch_names(), params.cluster.as_slice())?;
    let context_sig = cluster_signal(context.data(), context.ch_names(), params.cluster.as_slice())?;

    let (peak_time, _) = find_peak(&random_sig, &times, params.window, Polarity::Negative)?;
    let random_amp = mean_amplitude_around_peak(&random_sig, &times, peak_time, sfreq, params.window_area)?;
    let context_amp = mean_amplitude_around_peak(&context_sig, &times, peak_time, sfreq, params.window_area)?;
    Ok(N400Row {
        participant_id: participant_id.to_string(),
        latency_ms: latency_ms(peak_time),
        random_uv: random_amp * V_TO_UV,
        context_uv: context_amp * V_TO_UV,
    })
}

/// Long-format N400 table: all random rows, then all context rows.
pub fn write_n400_csv<W: Write>(mut w: W, rows: &[N400Row]) -> anyhow::Result<()> {
    writeln!(w, "participant_id,N400_latency_ms,condition,amplitude_uV")?;
    let conditions: [(&str, fn(&N400Row) -> f64); 2] =
        [("random", |r| r.random_uv), ("context", |r| r.context_uv)];
    for (condition, pick) in conditions {
        for r in rows {
            writeln!(w, "{},{},{},{}", r.participant_id, r.latency_ms, condition, pick(r))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn polarity_parse() {
        assert_eq!("positive".parse::<Polarity>().unwrap(), Polarity::Positive);
        assert_eq!("negative".parse::<Polarity>().unwrap(), Polarity::Negative);
        assert!(matches!("upward".parse::<Polarity>(), Err(Error::Configuration(_))));
    }

    #[test]
    fn cluster_averages_named_channels() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [100.0, 100.0]];
        let names = vec!["Fz".to_string(), "Cz".to_string(), "Pz".to_string()];
        assert_eq!(cluster_signal(&data, &names, &["Fz", "Cz"]).unwrap(), vec![2.0, 3.0]);
        assert!(matches!(cluster_signal(&data, &names, &["Oz"]), Err(Error::Input(_))));
    }

    #[test]
    fn peak_at_window_edge_is_found() {
        let times: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        let mut signal = vec![0.0; 11];
        signal[6] = 2.0;
        signal[8] = 9.0;
        let (t, i) = find_peak(&signal, &times, [0.2, 0.6], Polarity::Positive).unwrap();
        assert_eq!(i, 6);
        approx::assert_abs_diff_eq!(t, 0.6);
    }

    #[test]
    fn ties_go_to_earliest() {
        let times = [0.0, 0.1, 0.2, 0.3];
        let signal = [-1.0, -3.0, -3.0, 0.0];
        assert_eq!(find_peak(&signal, &times, [0.0, 0.3], Polarity::Negative).unwrap().1, 1);
    }

    #[test]
    fn empty_window_is_input_error() {
        let times = [0.0, 0.1, 0.2];
        let err = find_peak(&[0.0; 3], &times, [0.5, 0.9], Polarity::Positive).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn amplitude_window_is_half_open() {
        let times: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        let signal: Vec<f64> = (0..10).map(f64::from).collect();
        // w = 2: samples 3, 4, 5, 6
        let m = mean_amplitude_around_peak(&signal, &times, 0.5, 10.0, 0.2).unwrap();
        approx::assert_abs_diff_eq!(m, 4.5);
    }

    #[test]
    fn amplitude_window_out_of_range() {
        let times: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        let signal = vec![1.0; 10];
        assert!(matches!(
            mean_amplitude_around_peak(&signal, &times, 0.1, 10.0, 0.2),
            Err(Error::Input(_))
        ));
        assert!(matches!(
            mean_amplitude_around_peak(&signal, &times, 0.9, 10.0, 0.2),
            Err(Error::Input(_))
        ));
        assert!(mean_amplitude_around_peak(&signal, &times, 0.8, 10.0, 0.2).is_ok());
    }

    #[test]
    fn latency_in_whole_milliseconds() {
        assert_eq!(latency_ms(0.1), 100);
        assert_eq!(latency_ms(0.0996), 100);
        assert_eq!(latency_ms(0.3904), 390);
    }

    #[test]
    fn n400_csv_is_long_format() {
        let rows = vec![
            N400Row { participant_id: "p01".into(), latency_ms: 400, random_uv: -3.0, context_uv: -1.0 },
            N400Row { participant_id: "p02".into(), latency_ms: 380, random_uv: -2.5, context_uv: -0.5 },
        ];
        let mut buf = Vec::new();
        write_n400_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "participant_id,N400_latency_ms,condition,amplitude_uV");
        assert_eq!(lines[1], "p01,400,random,-3");
        assert_eq!(lines[3], "p01,400,context,-1");
        assert_eq!(lines.len(), 5);
    }
}

//! Envelope-to-EEG phase locking.
//!
//! `PLV = |mean_t exp(i·(φ_env(t) − φ_eeg(t)))|`, 1 for a constant phase lag
//! and near 0 for unrelated phases.  A band array `[stimulus, 1 + channel,
//! sample]` (envelope phase in row 0) gives one PLV per stimulus and channel.
use std::io::Write;

use ndarray::{Array2, Array3, Array4, ArrayView1, Axis};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use crate::config::FrequencyBand;
use crate::error::{Error, Result};

/// Phase-locking value between two phase series of equal length.
///
/// # Errors
///
/// [`Error::Input`] if the series are empty or differ in length.
pub fn phase_locking_value(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
    if a.len() != b.len() || a.is_empty() {
        return Err(Error::input(format!(
            "phase series must be non-empty and equal in length ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    let sum: Complex64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| Complex64::from_polar(1.0, x - y))
        .sum();
    Ok(sum.norm() / a.len() as f64)
}

/// PLV of row 0 against every other row, per stimulus.  Returns
/// `[stimulus, channel]`.
///
/// # Errors
///
/// [`Error::Input`] if the array has no EEG rows or no samples.
pub fn band_plv(band_array: &Array3<f64>) -> Result<Array2<f64>> {
    let (n_stim, n_rows, _) = band_array.dim();
    if n_rows < 2 {
        return Err(Error::input("band array needs an envelope row and at least one EEG row"));
    }
    let rows: Vec<Vec<f64>> = band_array
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|stim| {
            let env = stim.row(0);
            (1..n_rows)
                .map(|ch| phase_locking_value(env, stim.row(ch)))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;
    Array2::from_shape_vec((n_stim, n_rows - 1), rows.concat()).map_err(|e| Error::input(e.to_string()))
}

/// PLVs of a whole cohort, `[participant, band, stimulus, channel]`, NaN
/// where no value has been stored.
#[derive(Debug, Clone)]
pub struct TrackingTensor {
    pub participants: Vec<String>,
    pub bands: Vec<FrequencyBand>,
    pub stimuli: Vec<String>,
    pub channels: Vec<String>,
    pub data: Array4<f64>,
}

impl TrackingTensor {
    pub fn new(participants: Vec<String>, bands: Vec<FrequencyBand>, stimuli: Vec<String>, channels: Vec<String>) -> Self {
        let shape = (participants.len(), bands.len(), stimuli.len(), channels.len());
        Self { participants, bands, stimuli, channels, data: Array4::from_elem(shape, f64::NAN) }
    }

    /// Store a participant's `[stimulus, channel]` matrix for one band.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] for an unknown participant or band, or a matrix of
    /// the wrong shape.
    pub fn set(&mut self, participant: &str, band: &str, plv: &Array2<f64>) -> Result<()> {
        let p = self
            .participants
            .iter()
            .position(|x| x == participant)
            .ok_or_else(|| Error::input(format!("unknown participant `{participant}`")))?;
        let b = self
            .bands
            .iter()
            .position(|x| x.name == band)
            .ok_or_else(|| Error::input(format!("unknown band `{band}`")))?;
        let expected = (self.stimuli.len(), self.channels.len());
        if plv.dim() != expected {
            return Err(Error::input(format!(
                "{participant}/{band}: PLV matrix is {:?}, expected {expected:?}",
                plv.dim()
            )));
        }
        self.data.index_axis_mut(Axis(0), p).index_axis_mut(Axis(0), b).assign(plv);
        Ok(())
    }

    /// Long table: one row per participant, band, stimulus and channel, in
    /// that nesting order.  Missing (NaN) entries are skipped.
    pub fn write_long_csv<W: Write>(&self, mut w: W, columns: &[String]) -> anyhow::Result<()> {
        anyhow::ensure!(columns.len() == 5, "tracking table needs 5 column names, got {}", columns.len());
        writeln!(w, "{}", columns.join(","))?;
        for ((p, b, s, c), &v) in self.data.indexed_iter() {
            if v.is_nan() {
                continue;
            }
            writeln!(
                w,
                "{},{},{},{},{}",
                self.participants[p], self.bands[b].name, self.stimuli[s], self.channels[c], v
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn constant_lag_is_fully_locked() {
        let a = Array1::linspace(0.0, 20.0, 200).mapv(|p: f64| p.sin().atan2(p.cos()));
        let b = a.mapv(|p| p - 0.7);
        approx::assert_abs_diff_eq!(phase_locking_value(a.view(), b.view()).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn opposing_phases_cancel() {
        let a = array![0.0, 0.0, 0.0, 0.0];
        let b = array![0.0, std::f64::consts::PI, 0.5 * std::f64::consts::PI, -0.5 * std::f64::consts::PI];
        approx::assert_abs_diff_eq!(phase_locking_value(a.view(), b.view()).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn length_mismatch_rejected() {
        let a = array![0.0, 1.0];
        let b = array![0.0];
        assert!(matches!(phase_locking_value(a.view(), b.view()), Err(Error::Input(_))));
    }

    #[test]
    fn band_plv_shape() {
        let arr = Array3::from_shape_fn((3, 4, 50), |(s, r, t)| (t as f64 * 0.3 + s as f64 + r as f64 * 0.1).sin());
        let plv = band_plv(&arr).unwrap();
        assert_eq!(plv.dim(), (3, 3));
        assert!(plv.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
        assert!(band_plv(&Array3::zeros((2, 1, 10))).is_err());
    }

    #[test]
    fn tensor_long_csv_skips_missing() {
        let bands = vec![FrequencyBand::new("word_rate", 1.3, 3.5, 7.0), FrequencyBand::new("syllable_rate", 3.5, 7.0, 7.0)];
        let mut t = TrackingTensor::new(
            vec!["p01".into()],
            bands,
            vec!["s1".into(), "s2".into()],
            vec!["Fz".into()],
        );
        t.set("p01", "syllable_rate", &array![[0.25], [0.5]]).unwrap();
        assert!(t.set("p02", "syllable_rate", &array![[0.25], [0.5]]).is_err());
        assert!(t.set("p01", "word_rate", &array![[0.25]]).is_err());

        let cols: Vec<String> = ["participant_id", "frequency_band", "stimulus_id", "channel_id", "plv"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut buf = Vec::new();
        t.write_long_csv(&mut buf, &cols).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "participant_id,frequency_band,stimulus_id,channel_id,plv\n\
             p01,syllable_rate,s1,Fz,0.25\n\
             p01,syllable_rate,s2,Fz,0.5\n"
        );
    }
}

//! Audio waveforms: samples plus sample rate.
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{Error, Result};

/// Length of the presentation-level suffix (`_70dB`) carried by raw
/// stimulus names.
pub const LEVEL_SUFFIX_LEN: usize = 5;

/// Stimulus id of a raw recording: its stem without the level suffix
/// (`sentence012_70dB → sentence012`).
///
/// # Errors
///
/// [`Error::Input`] if the stem has no characters left after removing the
/// suffix.
pub fn cut_name(raw_stem: &str) -> Result<String> {
    let n_chars = raw_stem.chars().count();
    if n_chars <= LEVEL_SUFFIX_LEN {
        return Err(Error::input(format!("stem `{raw_stem}` is too short to carry a level suffix")));
    }
    Ok(raw_stem.chars().take(n_chars - LEVEL_SUFFIX_LEN).collect())
}

/// Immutable multichannel audio, `[channel, sample]`, full scale `±1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    data: Array2<f64>,
    sfreq: f64,
}

impl Waveform {
    pub fn new(data: Array2<f64>, sfreq: f64) -> Self {
        Self { data, sfreq }
    }

    pub fn from_mono(samples: Vec<f64>, sfreq: f64) -> Self {
        let data = Array1::from(samples).insert_axis(Axis(0));
        Self { data, sfreq }
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.n_samples() as f64 / self.sfreq
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// The single channel of a mono waveform.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if the waveform has more or fewer than one channel.
    pub fn mono(&self) -> Result<ArrayView1<'_, f64>> {
        if self.n_channels() != 1 {
            return Err(Error::input(format!(
                "expected a mono waveform, got {} channels",
                self.n_channels()
            )));
        }
        Ok(self.data.row(0))
    }

    /// Drop the lead-in before the trigger cue.
    ///
    /// Raw stimuli are stereo: speech on channel 0, a trigger train on
    /// channel 1.  Returns the speech channel from the first non-zero trigger
    /// sample onwards, as a mono waveform.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if the waveform is not stereo or the trigger channel
    /// is silent.
    pub fn cut_from_cue(&self) -> Result<Waveform> {
        if self.n_channels() != 2 {
            return Err(Error::input(format!(
                "cue trimming needs a stereo file (speech + trigger), got {} channels",
                self.n_channels()
            )));
        }
        let onset = self
            .data
            .row(1)
            .iter()
            .position(|&v| v != 0.0)
            .ok_or_else(|| Error::input("trigger channel contains no cue"))?;
        let speech = self.data.row(0).iter().skip(onset).copied().collect();
        Ok(Waveform::from_mono(speech, self.sfreq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_accessor_rejects_stereo() {
        let w = Waveform::new(Array2::zeros((2, 10)), 100.0);
        assert!(matches!(w.mono(), Err(Error::Input(_))));
        let w = Waveform::from_mono(vec![0.5; 10], 100.0);
        assert_eq!(w.mono().unwrap().len(), 10);
        approx::assert_abs_diff_eq!(w.duration(), 0.1);
    }

    #[test]
    fn cut_from_first_trigger() {
        let mut data = Array2::zeros((2, 6));
        for t in 0..6 {
            data[[0, t]] = t as f64;
        }
        data[[1, 2]] = 1.0;
        data[[1, 4]] = 1.0;
        let cut = Waveform::new(data, 10.0).cut_from_cue().unwrap();
        assert_eq!(cut.n_channels(), 1);
        assert_eq!(cut.mono().unwrap().to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn cut_name_drops_level_suffix() {
        assert_eq!(cut_name("context012_70dB").unwrap(), "context012");
        assert_eq!(cut_name("r1_65dB").unwrap(), "r1");
        assert_eq!(cut_name("séance_70dB").unwrap(), "séance");
        assert!(matches!(cut_name("_70dB"), Err(Error::Input(_))));
        assert!(matches!(cut_name("ab"), Err(Error::Input(_))));
    }

    #[test]
    fn cut_requires_trigger() {
        let w = Waveform::new(Array2::zeros((2, 6)), 10.0);
        assert!(matches!(w.cut_from_cue(), Err(Error::Input(_))));
        let w = Waveform::from_mono(vec![0.0; 6], 10.0);
        assert!(matches!(w.cut_from_cue(), Err(Error::Input(_))));
    }
}

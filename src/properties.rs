//! Per-stimulus speech duration and linguistic rates.
//!
//! The speech duration is the trimmed file length minus the trailing
//! silence marked in the word tier of the forced alignment.  Rates are
//! counts per second of that duration: phrases (fixed per sentence), words
//! and phones (labelled intervals of their tiers), syllables (sentence
//! list).  The mean speech duration is the reference length of the
//! modulation spectrum.
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};
use rayon::prelude::*;

use crate::config::{PropertiesParams, SpectrumConfig};
use crate::error::{Error, Result};
use crate::io::{read_sentence_list, read_table, read_textgrid, read_wav, SentenceEntry};
use crate::textgrid::{Interval, TextGrid, Tier};

/// Column names of the properties table.
pub const PROPERTIES_COLUMNS: [&str; 6] = ["file", "duration", "phrase_rate", "word_rate", "syllable_rate", "phone_rate"];

#[derive(Debug, Clone, PartialEq)]
pub struct StimulusProperties {
    pub file: String,
    /// Speech duration without trailing silence, seconds.
    pub duration: f64,
    pub phrase_rate: f64,
    pub word_rate: f64,
    pub syllable_rate: f64,
    pub phone_rate: f64,
}

/// `audio_duration` minus the last word interval when that interval is
/// silent.
///
/// # Errors
///
/// [`Error::Input`] if nothing is left.
pub fn speech_duration(audio_duration: f64, words: &[Interval]) -> Result<f64> {
    let trailing = words.last().filter(|i| i.is_silent()).map_or(0.0, |i| i.duration().abs());
    let duration = audio_duration - trailing;
    if !(duration > 0.0) {
        return Err(Error::input(format!(
            "no speech left after removing {trailing} s of trailing silence from {audio_duration} s"
        )));
    }
    Ok(duration)
}

fn tier_at<'a>(grid: &'a TextGrid, params: &PropertiesParams, role: &str) -> Result<&'a Tier> {
    let idx = params.tier_index(role)?;
    let tier = grid
        .tiers
        .get(idx)
        .ok_or_else(|| Error::input(format!("TextGrid has {} tiers, `{role}` tier expected at {idx}", grid.tiers.len())))?;
    if tier.intervals().is_none() {
        return Err(Error::input(format!("`{role}` tier `{}` is not an interval tier", tier.name)));
    }
    Ok(tier)
}

/// Duration and rates of one stimulus.
pub fn stimulus_properties(
    entry: &SentenceEntry,
    audio_duration: f64,
    grid: &TextGrid,
    params: &PropertiesParams,
) -> Result<StimulusProperties> {
    let words = tier_at(grid, params, "word")?;
    let phones = tier_at(grid, params, "phone")?;
    let duration = speech_duration(audio_duration, words.intervals().unwrap_or(&[]))?;
    Ok(StimulusProperties {
        file: entry.file.clone(),
        duration,
        phrase_rate: params.n_phrases as f64 / duration,
        word_rate: words.labelled_count() as f64 / duration,
        syllable_rate: entry.syllables as f64 / duration,
        phone_rate: phones.labelled_count() as f64 / duration,
    })
}

/// Mean speech duration of a properties table.
pub fn mean_duration(rows: &[StimulusProperties]) -> Result<f64> {
    if rows.is_empty() {
        return Err(Error::input("properties table is empty"));
    }
    Ok(rows.iter().map(|r| r.duration).sum::<f64>() / rows.len() as f64)
}

pub fn write_properties_csv<W: Write>(mut w: W, rows: &[StimulusProperties]) -> anyhow::Result<()> {
    writeln!(w, "{}", PROPERTIES_COLUMNS.join(","))?;
    for r in rows {
        writeln!(
            w,
            "{},{},{},{},{},{}",
            r.file, r.duration, r.phrase_rate, r.word_rate, r.syllable_rate, r.phone_rate
        )?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_properties_csv(path: &Path) -> anyhow::Result<Vec<StimulusProperties>> {
    let table = read_table(path, ',')?;
    let idx: Vec<usize> = PROPERTIES_COLUMNS
        .iter()
        .map(|c| table.column(c))
        .collect::<Result<_>>()
        .with_context(|| format!("reading {}", path.display()))?;
    table
        .rows()
        .iter()
        .map(|row| -> anyhow::Result<StimulusProperties> {
            let num = |k: usize| -> anyhow::Result<f64> {
                let cell = &row[idx[k]];
                cell.parse()
                    .with_context(|| format!("{}: `{}` of `{}` is not a number: `{cell}`", path.display(), PROPERTIES_COLUMNS[k], row[idx[0]]))
            };
            Ok(StimulusProperties {
                file: row[idx[0]].clone(),
                duration: num(1)?,
                phrase_rate: num(2)?,
                word_rate: num(3)?,
                syllable_rate: num(4)?,
                phone_rate: num(5)?,
            })
        })
        .collect()
}

fn textgrid_path(cfg: &SpectrumConfig, file: &str) -> PathBuf {
    let p = &cfg.properties;
    p.textgrid_folder.join(format!("{file}{}.TextGrid", p.textgrid_suffix))
}

/// Properties of every stimulus in the sentence list, in list order.
///
/// Audio comes from `stimuli_folder/{file}.wav`, alignments from
/// `textgrid_folder/{file}{textgrid_suffix}.TextGrid`.
pub fn linguistic_properties(cfg: &SpectrumConfig) -> anyhow::Result<Vec<StimulusProperties>> {
    cfg.properties.validate()?;
    let sentences = read_sentence_list(&cfg.properties.sentences_file)?;
    info!("{} sentences in {}", sentences.len(), cfg.properties.sentences_file.display());
    sentences
        .par_iter()
        .map(|entry| -> anyhow::Result<StimulusProperties> {
            let audio = read_wav(&cfg.stimuli_folder.join(format!("{}.wav", entry.file)))?;
            let grid = read_textgrid(&textgrid_path(cfg, &entry.file))?;
            let props = stimulus_properties(entry, audio.duration(), &grid, &cfg.properties)
                .with_context(|| format!("stimulus `{}`", entry.file))?;
            debug!("{}: {:.3} s of speech, {:.2} syllables/s", props.file, props.duration, props.syllable_rate);
            Ok(props)
        })
        .collect()
}

/// Write the table to [`SpectrumConfig::properties_path`].
pub fn save_properties(cfg: &SpectrumConfig, rows: &[StimulusProperties]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(&cfg.output_folder).with_context(|| format!("creating {}", cfg.output_folder.display()))?;
    let path = cfg.properties_path();
    let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    write_properties_csv(std::io::BufWriter::new(file), rows)?;
    Ok(path)
}

/// Reference duration for the modulation spectrum: `mean_duration_s` when
/// set, else the mean of the properties table when
/// `duration_from_properties` is on, else `None` (mean file duration).
pub fn reference_duration(cfg: &SpectrumConfig) -> anyhow::Result<Option<f64>> {
    if let Some(d) = cfg.mean_duration_s {
        return Ok(Some(d));
    }
    if !cfg.duration_from_properties {
        return Ok(None);
    }
    let path = cfg.properties_path();
    let rows = read_properties_csv(&path)?;
    let d = mean_duration(&rows).with_context(|| format!("averaging {}", path.display()))?;
    info!("Reference duration {d:.3} s from {} stimuli in {}", rows.len(), path.display());
    Ok(Some(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textgrid::TierKind;

    fn interval(xmin: f64, xmax: f64, text: &str) -> Interval {
        Interval { xmin, xmax, text: text.into() }
    }

    fn grid() -> TextGrid {
        let words = vec![interval(0.0, 0.4, "the"), interval(0.4, 0.9, "dog"), interval(0.9, 1.2, "")];
        let phones = vec![
            interval(0.0, 0.2, "DH"),
            interval(0.2, 0.4, "AH0"),
            interval(0.4, 0.5, "D"),
            interval(0.5, 0.7, "AO1"),
            interval(0.7, 0.9, "G"),
            interval(0.9, 1.2, ""),
        ];
        let tier = |name: &str, v| Tier { name: name.into(), xmin: 0.0, xmax: 1.2, kind: TierKind::Intervals(v) };
        TextGrid { xmin: 0.0, xmax: 1.2, tiers: vec![tier("words", words), tier("phones", phones)] }
    }

    #[test]
    fn trailing_silence_is_removed() {
        let g = grid();
        let words = g.tiers[0].intervals().unwrap();
        approx::assert_abs_diff_eq!(speech_duration(1.25, words).unwrap(), 0.95, epsilon = 1e-12);
        // No trailing silence: nothing removed.
        approx::assert_abs_diff_eq!(speech_duration(1.25, &words[..2]).unwrap(), 1.25, epsilon = 1e-12);
        assert!(matches!(speech_duration(0.2, words), Err(Error::Input(_))));
    }

    #[test]
    fn rates_are_counts_per_speech_second() {
        let entry = SentenceEntry { file: "con001".into(), sentence: "The dog.".into(), syllables: 2 };
        let params = PropertiesParams { n_phrases: 1, ..Default::default() };
        let p = stimulus_properties(&entry, 1.3, &grid(), &params).unwrap();
        approx::assert_abs_diff_eq!(p.duration, 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(p.phrase_rate, 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(p.word_rate, 2.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(p.syllable_rate, 2.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(p.phone_rate, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn tier_order_selects_tiers() {
        let entry = SentenceEntry { file: "con001".into(), sentence: String::new(), syllables: 2 };
        let swapped = PropertiesParams { tier_order: vec!["phone".into(), "word".into()], ..Default::default() };
        let p = stimulus_properties(&entry, 1.3, &grid(), &swapped).unwrap();
        approx::assert_abs_diff_eq!(p.word_rate, 5.0, epsilon = 1e-12);

        let three = PropertiesParams { tier_order: vec!["x".into(), "word".into(), "phone".into()], ..Default::default() };
        assert!(matches!(stimulus_properties(&entry, 1.3, &grid(), &three), Err(Error::Input(_))));
    }

    #[test]
    fn mean_of_empty_table_is_input_error() {
        assert!(matches!(mean_duration(&[]), Err(Error::Input(_))));
    }
}

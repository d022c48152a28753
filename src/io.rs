//! File I/O: safetensors archives, WAV audio, trial logs and stimulus
//! listings.
//!
//! Array artifacts (epochs, evoked responses, band phase arrays, the PLV
//! tensor, the modulation spectrum) are safetensors files: an 8-byte
//! little-endian header length, a JSON header, then raw little-endian
//! tensor bytes.  String lists (channel names, stimulus ids) are stored as
//! newline-joined `U8` tensors; free-form metadata goes into the standard
//! `__metadata__` header entry.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array, ArrayD, Dimension, IxDyn};

use crate::epoch::{Epochs, Evoked, TrialMetadata};
use crate::table::Table;
use crate::textgrid::TextGrid;
use crate::waveform::Waveform;

// ── Low-level safetensors parser ──────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len()).context("safetensors header overruns file")?;
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry without shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("non-integer dimension"))
        .collect()
}

/// A parsed safetensors file held in memory.
pub struct SafeTensors {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

/// Read and parse a safetensors file.
pub fn read_safetensors(path: &Path) -> Result<SafeTensors> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    Ok(SafeTensors { bytes, header, data_start })
}

impl SafeTensors {
    fn entry(&self, name: &str) -> Result<&serde_json::Value> {
        self.header.get(name).with_context(|| format!("missing '{name}' key"))
    }

    fn raw(&self, entry: &serde_json::Value) -> Result<&[u8]> {
        let offsets = entry["data_offsets"].as_array().context("tensor entry without data_offsets")?;
        let bound = |i: usize| -> Result<usize> {
            offsets
                .get(i)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .context("malformed data_offsets")
        };
        let (s, e) = (self.data_start + bound(0)?, self.data_start + bound(1)?);
        self.bytes.get(s..e).context("tensor data past end of file")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    /// A numeric tensor converted to `f64`.  Handles F32, F64, I32, I64.
    pub fn tensor(&self, name: &str) -> Result<ArrayD<f64>> {
        let entry = self.entry(name)?;
        let shape = shape_of(entry)?;
        let raw = self.raw(entry)?;
        let dtype = entry["dtype"].as_str().unwrap_or("");
        let vals: Vec<f64> = match dtype {
            "F64" => raw.chunks_exact(8).map(|b| f64::from_le_bytes(le8(b))).collect(),
            "F32" => raw.chunks_exact(4).map(|b| f32::from_le_bytes(le4(b)) as f64).collect(),
            "I64" => raw.chunks_exact(8).map(|b| i64::from_le_bytes(le8(b)) as f64).collect(),
            "I32" => raw.chunks_exact(4).map(|b| i32::from_le_bytes(le4(b)) as f64).collect(),
            other => bail!("'{name}': unsupported dtype {other}"),
        };
        Array::from_shape_vec(IxDyn(&shape), vals).with_context(|| format!("'{name}': shape {shape:?}"))
    }

    /// A tensor of fixed dimensionality, e.g. `tensor_as::<ndarray::Ix3>("data")`.
    pub fn tensor_as<D: Dimension>(&self, name: &str) -> Result<Array<f64, D>> {
        self.tensor(name)?
            .into_dimensionality::<D>()
            .with_context(|| format!("'{name}' has the wrong number of dimensions"))
    }

    /// First element of a numeric tensor.
    pub fn scalar(&self, name: &str) -> Result<f64> {
        self.tensor(name)?
            .iter()
            .next()
            .copied()
            .with_context(|| format!("'{name}' is empty"))
    }

    /// A newline-joined `U8` string list.
    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        let raw = self.raw(self.entry(name)?)?;
        let text = std::str::from_utf8(raw).with_context(|| format!("'{name}' is not UTF-8"))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }

    /// The `__metadata__` string map (empty if absent).
    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.header
            .get("__metadata__")
            .and_then(|m| m.as_object())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn le8(b: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(b);
    out
}

fn le4(b: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(b);
    out
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Safetensors file writer for F64 tensors, string lists and metadata.
///
/// ```rust,no_run
/// use speechtrack::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_strings("ch_names", &["Fz".to_string(), "Cz".to_string()]);
/// w.add_metadata("band", "syllable_rate");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: BTreeMap<String, String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    /// Any-dimensional array, written in logical (row-major) order.
    pub fn add_array<D: Dimension>(&mut self, name: &str, arr: &Array<f64, D>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, arr.shape());
    }

    pub fn add_scalar(&mut self, name: &str, value: f64) {
        self.add_f64(name, &[value], &[1]);
    }

    /// Newline-joined UTF-8 list as a `U8` tensor.
    pub fn add_strings(&mut self, name: &str, items: &[String]) {
        let bytes = items.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::json!(self.metadata));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::io::BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        f.flush()?;
        Ok(())
    }
}

// ── Epochs / Evoked ───────────────────────────────────────────────────────────

/// Parse a tab-separated behavioural log.  Needs a `file` column with the
/// stimulus id of every trial; an optional `hit` column (`1`/`0`,
/// `True`/`False`) marks correct answers and defaults to correct.
pub fn read_trial_log(path: &Path) -> Result<Vec<TrialMetadata>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading log {}", path.display()))?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .with_context(|| format!("{}: empty log", path.display()))?
        .split('\t')
        .map(str::trim)
        .collect();
    let file_col = header
        .iter()
        .position(|&c| c == "file")
        .with_context(|| format!("{}: no `file` column", path.display()))?;
    let hit_col = header.iter().position(|&c| c == "hit");

    lines
        .enumerate()
        .map(|(trial, line)| {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let file = fields
                .get(file_col)
                .with_context(|| format!("{}: trial {trial} has no `file` field", path.display()))?;
            let hit = match hit_col.and_then(|c| fields.get(c)) {
                None => true,
                Some(v) => parse_hit(v).with_context(|| format!("{}: trial {trial}", path.display()))?,
            };
            Ok(TrialMetadata::new(trial, file, hit))
        })
        .collect()
}

fn parse_hit(v: &str) -> Result<bool> {
    match v {
        "1" | "1.0" | "True" | "true" => Ok(true),
        "0" | "0.0" | "False" | "false" | "" => Ok(false),
        other => Err(anyhow!("cannot read `{other}` as a hit flag")),
    }
}

/// Load epochs (`data [trial, channel, sample]`, `sfreq`, `tmin`,
/// `ch_names`) and join the trial log row by row.
pub fn load_epochs(path: &Path, log_path: &Path) -> Result<Epochs> {
    let st = read_safetensors(path)?;
    let data = st.tensor_as::<ndarray::Ix3>("data")?;
    let sfreq = st.scalar("sfreq")?;
    let tmin = st.scalar("tmin")?;
    let ch_names = st.strings("ch_names")?;
    let metadata = read_trial_log(log_path)?;
    Epochs::new(data, ch_names, sfreq, tmin, metadata)
        .with_context(|| format!("joining {} with {}", path.display(), log_path.display()))
}

/// Write epochs in the layout [`load_epochs`] reads.
pub fn save_epochs(path: &Path, epochs: &Epochs) -> Result<()> {
    let mut w = StWriter::new();
    w.add_array("data", epochs.data());
    w.add_scalar("sfreq", epochs.sfreq());
    w.add_scalar("tmin", epochs.tmin());
    w.add_strings("ch_names", epochs.ch_names());
    w.write(path)
}

pub fn save_evoked(path: &Path, evoked: &Evoked) -> Result<()> {
    let mut w = StWriter::new();
    w.add_array("data", evoked.data());
    w.add_scalar("sfreq", evoked.sfreq());
    w.add_scalar("tmin", evoked.tmin());
    w.add_scalar("nave", evoked.nave() as f64);
    w.add_strings("ch_names", evoked.ch_names());
    w.write(path)
}

pub fn load_evoked(path: &Path) -> Result<Evoked> {
    let st = read_safetensors(path)?;
    let data = st.tensor_as::<ndarray::Ix2>("data")?;
    let nave = if st.contains("nave") { st.scalar("nave")? as usize } else { 1 };
    Evoked::new(data, st.strings("ch_names")?, st.scalar("sfreq")?, st.scalar("tmin")?, nave)
        .with_context(|| format!("loading {}", path.display()))
}

// ── Tables and alignments ─────────────────────────────────────────────────────

/// A delimited table with a header line (`,` for CSV, `\t` for logs).
pub fn read_table(path: &Path, sep: char) -> Result<Table> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Table::parse(&text, sep).with_context(|| format!("parsing {}", path.display()))
}

/// One line of the sentence list.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceEntry {
    pub file: String,
    pub sentence: String,
    pub syllables: usize,
}

/// Tab-separated `file`, `sentence`, `syllables` lines without a header.
pub fn read_sentence_list(path: &Path) -> Result<Vec<SentenceEntry>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| -> Result<SentenceEntry> {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [file, sentence, syllables] = fields[..] else {
                bail!("{}: line {} has {} fields, expected 3", path.display(), i + 1, fields.len());
            };
            let syllables = syllables
                .parse::<f64>()
                .ok()
                .filter(|v| *v >= 0.0 && v.fract() == 0.0)
                .with_context(|| format!("{}: line {}: bad syllable count `{syllables}`", path.display(), i + 1))?;
            Ok(SentenceEntry { file: file.to_string(), sentence: sentence.to_string(), syllables: syllables as usize })
        })
        .collect()
}

/// Read a TextGrid, accepting UTF-8 (with or without BOM) and UTF-16 with BOM.
pub fn read_textgrid(path: &Path) -> Result<TextGrid> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let utf16 = |be: bool| -> Result<String> {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|b| if be { u16::from_be_bytes([b[0], b[1]]) } else { u16::from_le_bytes([b[0], b[1]]) })
            .collect();
        String::from_utf16(&units).with_context(|| format!("{} is not valid UTF-16", path.display()))
    };
    let text = match bytes.get(..2) {
        Some([0xFE, 0xFF]) => utf16(true)?,
        Some([0xFF, 0xFE]) => utf16(false)?,
        _ => String::from_utf8(bytes.clone()).with_context(|| format!("{} is not valid UTF-8", path.display()))?,
    };
    text.parse().with_context(|| format!("parsing {}", path.display()))
}

// ── Audio ─────────────────────────────────────────────────────────────────────

/// Read a WAV file into a `[channel, sample]` waveform scaled to `±1.0`.
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let n_ch = spec.channels as usize;
    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    let n = interleaved.len() / n_ch.max(1);
    let data = ndarray::Array2::from_shape_fn((n_ch, n), |(c, t)| interleaved[t * n_ch + c]);
    Ok(Waveform::new(data, spec.sample_rate as f64))
}

/// Write a waveform as 16-bit PCM, clipping to full scale.
pub fn write_wav_i16(path: &Path, waveform: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: waveform.n_channels() as u16,
        sample_rate: waveform.sfreq().round() as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    let data = waveform.data();
    for t in 0..waveform.n_samples() {
        for c in 0..waveform.n_channels() {
            let v = (data[[c, t]] * 32768.0).round().clamp(i16::MIN as f64, i16::MAX as f64);
            writer.write_sample(v as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

fn is_visible(p: &Path) -> bool {
    !p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('.'))
}

fn collect_wavs(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry.with_context(|| format!("listing {}", dir.display()))?.path();
        if !is_visible(&path) {
            continue;
        }
        if path.is_dir() {
            if recursive {
                collect_wavs(&path, true, out)?;
            }
        } else if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("wav")) {
            out.push(path);
        }
    }
    Ok(())
}

/// `*.wav` files directly under `dir`, sorted by file stem.  Hidden files
/// (`.` prefix, including `._` resource forks) are skipped.
pub fn list_wavs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_wavs(dir, false, &mut files)?;
    files.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
    Ok(files)
}

/// `*.wav` files anywhere below `dir`, sorted by file stem.  Hidden files
/// and folders are skipped; two files sharing a stem are an error since the
/// stem is the stimulus id.
pub fn list_wavs_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_wavs(dir, true, &mut files)?;
    files.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
    if let Some(pair) = files.windows(2).find(|w| w[0].file_stem() == w[1].file_stem()) {
        bail!("{} and {} share a stimulus id", pair[0].display(), pair[1].display());
    }
    Ok(files)
}

/// File stem as UTF-8, for use as a stimulus id.
pub fn stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
        .with_context(|| format!("{} has no UTF-8 file stem", path.display()))
}

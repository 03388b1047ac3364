//! Line-by-line driver: raw JSONL in, canonical JSONL out.
//!
//! Every line is handled independently. A line that cannot be parsed or
//! converted is logged, counted in `RunStats::rejected` and skipped; only
//! I/O failures on the output (or a missing input file) end the run.

use crate::assemble::format_row;
use crate::error::RecordError;
use crate::lenient::parse_record;
use crate::normalize::normalize_record;
use crate::template::format_text_row;
use aegis_types::validate_record_value;
use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

// ── Public types ────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub accepted: usize,
    pub rejected: usize,
}

impl RunStats {
    fn reject(&mut self, line_no: usize, err: &RecordError) {
        self.rejected += 1;
        warn!(line = line_no, kind = err.kind(), error = %err, "skipping record");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertMode {
    /// Three-role conversation with an image block; image required.
    Vision,
    /// `{"text": ...}` ChatML rows; image optional.
    ChatTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleOptions {
    pub enabled: bool,
    pub seed: Option<u64>,
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: None,
        }
    }
}

// ── Per-line conversion ─────────────────────────────────────────────────

fn to_value<T: Serialize>(row: &T) -> Result<Value, RecordError> {
    serde_json::to_value(row).map_err(|e| RecordError::InvalidShape(e.to_string()))
}

pub fn convert_line(line: &str, mode: ConvertMode) -> Result<Value, RecordError> {
    let record = parse_record(line).ok_or(RecordError::Unparseable)?;
    match mode {
        ConvertMode::Vision => {
            let row = format_row(&record)?;
            row.validate_schema()?;
            to_value(&row)
        }
        ConvertMode::ChatTemplate => {
            let row = format_text_row(&record);
            row.validate_schema()?;
            to_value(&row)
        }
    }
}

/// Already-structured input: normalize message content, then require the
/// canonical three-role shape.
pub fn normalize_line(line: &str) -> Result<Value, RecordError> {
    let record = parse_record(line).ok_or(RecordError::Unparseable)?;
    let normalized = normalize_record(&Value::Object(record));
    validate_record_value(&normalized)?;
    Ok(normalized)
}

// ── Stream drivers ──────────────────────────────────────────────────────

fn drive<I, B, S>(lines: I, mut build: B, mut sink: S) -> Result<RunStats>
where
    I: IntoIterator<Item = io::Result<String>>,
    B: FnMut(&str) -> Result<Value, RecordError>,
    S: FnMut(Value) -> Result<()>,
{
    let mut stats = RunStats::default();

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = match line {
            Ok(l) => l,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                stats.rejected += 1;
                warn!(line = line_no, error = %e, "unreadable input line");
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("read input line {line_no}")),
        };
        if line.trim().is_empty() {
            continue;
        }

        match build(&line) {
            Ok(value) => {
                sink(value)?;
                stats.accepted += 1;
            }
            Err(err) => stats.reject(line_no, &err),
        }
    }

    Ok(stats)
}

pub fn convert_lines<I, W>(lines: I, writer: &mut W, mode: ConvertMode) -> Result<RunStats>
where
    I: IntoIterator<Item = io::Result<String>>,
    W: Write,
{
    drive(
        lines,
        |line| convert_line(line, mode),
        |value| write_jsonl_value(&mut *writer, &value),
    )
}

/// Normalize every line, then shuffle the accepted set (if enabled) and write
/// it in one pass.
pub fn normalize_lines<I, W>(lines: I, writer: &mut W, shuffle: ShuffleOptions) -> Result<RunStats>
where
    I: IntoIterator<Item = io::Result<String>>,
    W: Write,
{
    let mut rows = Vec::new();
    let stats = drive(lines, normalize_line, |value| {
        rows.push(value);
        Ok(())
    })?;

    if shuffle.enabled {
        shuffle_records(&mut rows, shuffle.seed);
    }
    for row in &rows {
        write_jsonl_value(writer, row)?;
    }
    Ok(stats)
}

pub fn shuffle_records<T>(records: &mut [T], seed: Option<u64>) {
    match seed {
        Some(seed) => records.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => records.shuffle(&mut rand::thread_rng()),
    }
}

// ── File entry points ───────────────────────────────────────────────────

pub fn convert_file(input: &Path, output: &Path, mode: ConvertMode) -> Result<RunStats> {
    let reader = open_input(input)?;
    let mut writer = create_output(output)?;
    let stats = convert_lines(reader.lines(), &mut writer, mode)?;
    writer
        .flush()
        .with_context(|| format!("flush output {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        accepted = stats.accepted,
        rejected = stats.rejected,
        ?mode,
        "conversion finished"
    );
    Ok(stats)
}

pub fn normalize_file(input: &Path, output: &Path, shuffle: ShuffleOptions) -> Result<RunStats> {
    let reader = open_input(input)?;
    let mut writer = create_output(output)?;
    let stats = normalize_lines(reader.lines(), &mut writer, shuffle)?;
    writer
        .flush()
        .with_context(|| format!("flush output {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        accepted = stats.accepted,
        rejected = stats.rejected,
        shuffled = shuffle.enabled,
        "normalization finished"
    );
    Ok(stats)
}

pub(crate) fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("open input {}", path.display()))?;
    let metadata = file
        .metadata()
        .with_context(|| format!("stat input {}", path.display()))?;
    ensure!(metadata.is_file(), "input {} is not a regular file", path.display());
    Ok(BufReader::new(file))
}

pub(crate) fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create output {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub(crate) fn write_jsonl_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    writer.write_all(&buf)?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────

//! Concatenate several JSONL datasets into one file.
//!
//! Inputs are read in order and every strictly valid JSON line is re-emitted
//! compactly. Optionally the `expected_output.thought` coordinates are clamped
//! on the way through, and records identical to an earlier one (by xxh3 of
//! their compact serialization) are dropped.

use crate::clamp::clamp_coordinates;
use crate::pipeline::{create_output, open_input, write_jsonl_value};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use xxhash_rust::xxh3::xxh3_64;

// ── Public types ────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub clamp_thought: bool,
    pub dedupe: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub merged: usize,
    pub skipped_duplicates: usize,
    pub errors: usize,
    pub missing_inputs: usize,
}

// ── Merge ───────────────────────────────────────────────────────────────

pub fn merge_files(inputs: &[PathBuf], output: &Path, options: MergeOptions) -> Result<MergeStats> {
    let mut writer = create_output(output)?;
    let mut stats = MergeStats::default();
    let mut seen = HashSet::new();

    for input in inputs {
        if !input.exists() {
            warn!(input = %input.display(), "input not found, skipping");
            stats.missing_inputs += 1;
            continue;
        }

        let reader = open_input(input)?;
        let mut added = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(input = %input.display(), line = idx + 1, error = %e, "unreadable line");
                    stats.errors += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("read input {} line {}", input.display(), idx + 1)
                    });
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let mut json: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(input = %input.display(), line = idx + 1, error = %e, "invalid JSON line");
                    stats.errors += 1;
                    continue;
                }
            };

            if options.clamp_thought {
                clamp_thought(&mut json);
            }

            if options.dedupe {
                let fp = xxh3_64(&serde_json::to_vec(&json)?);
                if !seen.insert(fp) {
                    stats.skipped_duplicates += 1;
                    continue;
                }
            }

            write_jsonl_value(&mut writer, &json)?;
            stats.merged += 1;
            added += 1;
        }
        info!(input = %input.display(), added, "input merged");
    }

    writer
        .flush()
        .with_context(|| format!("flush output {}", output.display()))?;
    Ok(stats)
}

/// Clamp coordinates inside `expected_output.thought` when it is a string.
pub fn clamp_thought(record: &mut Value) {
    if let Some(Value::String(thought)) = record.pointer_mut("/expected_output/thought") {
        let clamped = clamp_coordinates(thought).into_owned();
        *thought = clamped;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_rows(rows: &[Value]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        for row in rows {
            serde_json::to_writer(&mut f, row).unwrap();
            f.write_all(b"\n").unwrap();
        }
        f.flush().unwrap();
        f
    }

    fn read_rows(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn row(id: u32, thought: &str) -> Value {
        json!({"id": id, "expected_output": {"thought": thought, "action": "click"}})
    }

    #[test]
    fn concatenates_inputs_in_order() {
        let a = write_rows(&[row(1, "a"), row(2, "b")]);
        let b = write_rows(&[row(3, "c")]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.jsonl");

        let inputs = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let stats = merge_files(&inputs, &output, MergeOptions::default()).unwrap();
        assert_eq!(stats.merged, 3);

        let ids: Vec<u64> = read_rows(&output)
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn missing_inputs_are_skipped() {
        let a = write_rows(&[row(1, "a")]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out/merged.jsonl");

        let inputs = vec![dir.path().join("nope.jsonl"), a.path().to_path_buf()];
        let stats = merge_files(&inputs, &output, MergeOptions::default()).unwrap();
        assert_eq!(stats.missing_inputs, 1);
        assert_eq!(stats.merged, 1);
        assert!(output.exists());
    }

    #[test]
    fn malformed_lines_are_counted() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "not json at all").unwrap();
        serde_json::to_writer(&mut f, &row(1, "a")).unwrap();
        writeln!(f).unwrap();
        writeln!(f, "{{'single': 'quotes'}}").unwrap();
        f.flush().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.jsonl");
        let stats =
            merge_files(&[f.path().to_path_buf()], &output, MergeOptions::default()).unwrap();
        assert_eq!(stats.merged, 1);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn clamps_thought_coordinates_when_requested() {
        let a = write_rows(&[row(1, "box [10, 1200, -3, 40]")]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.jsonl");

        let options = MergeOptions {
            clamp_thought: true,
            ..Default::default()
        };
        merge_files(&[a.path().to_path_buf()], &output, options).unwrap();
        assert_eq!(
            read_rows(&output)[0]["expected_output"]["thought"],
            json!("box [10, 1000, 0, 40]")
        );

        merge_files(&[a.path().to_path_buf()], &output, MergeOptions::default()).unwrap();
        assert_eq!(
            read_rows(&output)[0]["expected_output"]["thought"],
            json!("box [10, 1200, -3, 40]")
        );
    }

    #[test]
    fn dedupe_drops_repeated_records_across_inputs() {
        let a = write_rows(&[row(1, "a"), row(2, "b")]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.jsonl");

        // The same phase file listed twice.
        let inputs = vec![a.path().to_path_buf(), a.path().to_path_buf()];
        let options = MergeOptions {
            dedupe: true,
            ..Default::default()
        };
        let stats = merge_files(&inputs, &output, options).unwrap();
        assert_eq!(stats.merged, 2);
        assert_eq!(stats.skipped_duplicates, 2);

        let stats = merge_files(&inputs, &output, MergeOptions::default()).unwrap();
        assert_eq!(stats.merged, 4);
    }

    #[test]
    fn directory_input_is_fatal() {
        let a = write_rows(&[row(1, "a")]);
        let dir = tempfile::tempdir().unwrap();
        let shards = dir.path().join("shards");
        fs::create_dir(&shards).unwrap();
        let output = dir.path().join("merged.jsonl");

        let inputs = vec![a.path().to_path_buf(), shards];
        let err = merge_files(&inputs, &output, MergeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn clamp_thought_ignores_non_string_thoughts() {
        let mut value = json!({"expected_output": {"thought": [1, 2, 3, 4000]}});
        let before = value.clone();
        clamp_thought(&mut value);
        assert_eq!(value, before);

        let mut no_output = json!({"persona": "X"});
        clamp_thought(&mut no_output);
        assert_eq!(no_output, json!({"persona": "X"}));
    }
}

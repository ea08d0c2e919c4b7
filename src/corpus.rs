use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Append-only newline-delimited JSON sink.
///
/// Every line is flushed as soon as it is written, so an interrupted run
/// loses at most the record currently in flight.
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl JsonlWriter {
    /// Open a fresh corpus, truncating anything already at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;

        let file = File::create(&path)
            .with_context(|| format!("Failed to create corpus file: {}", path.display()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Open a corpus for accumulation, keeping lines from prior runs
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open corpus file: {}", path.display()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Serialize one record as a single JSON line and flush it
    pub fn append_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        self.append_line(&line)
    }

    /// Write one pre-serialized line and flush it.
    /// The caller guarantees `line` contains no newline.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush())
            .with_context(|| format!("Failed to append to corpus: {}", self.path.display()))?;

        self.lines += 1;
        Ok(())
    }

    /// Lines written by this writer (not counting prior runs)
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write a JSON value pretty-printed to `path`, replacing any previous content
pub fn write_summary(path: impl AsRef<Path>, value: &serde_json::Value) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;

    debug!(path = %path.display(), "Wrote query summary");

    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_append_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut writer = JsonlWriter::create(&path).unwrap();
        writer.append_line(r#"{"a":1}"#).unwrap();
        writer.append_line(r#"{"b":2}"#).unwrap();
        assert_eq!(writer.lines_written(), 2);
        drop(writer);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn test_append_accumulates_across_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut first = JsonlWriter::append(&path).unwrap();
        first.append_line(r#"{"run":1}"#).unwrap();
        drop(first);

        let mut second = JsonlWriter::append(&path).unwrap();
        second.append_line(r#"{"run":2}"#).unwrap();
        assert_eq!(second.lines_written(), 1);
        drop(second);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_create_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut first = JsonlWriter::create(&path).unwrap();
        first.append_line(r#"{"old":true}"#).unwrap();
        drop(first);

        let second = JsonlWriter::create(&path).unwrap();
        drop(second);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.jsonl");

        let mut writer = JsonlWriter::create(&path).unwrap();
        writer.append_line("{}").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_summary_pretty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.json");

        let value = serde_json::json!({"total_reviews": 42, "review_score": 8});
        write_summary(&path, &value).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["total_reviews"], 42);
    }
}

// src/store/log.rs
//! Append-only snapshot history stored as JSON lines.
//!
//! Each record is one line, so a crash mid-write can only damage the newest
//! record. Reading is lenient: lines that are not JSON objects are skipped
//! with a warning, and missing or wrong-typed fields are surfaced as `None`
//! for the projection to decide on.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::ingest::types::Snapshot;

#[derive(Debug, Clone)]
pub struct SnapshotLog {
    path: PathBuf,
}

/// A snapshot as read back from disk. Fields that are absent or of the wrong
/// type come back as `None`; one bad observation never hides its siblings.
#[derive(Debug, Clone, Default)]
pub struct LoggedSnapshot {
    pub fetched_at: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub content_hash: Option<String>,
    pub metrics: Option<Vec<LoggedObservation>>,
}

impl LoggedSnapshot {
    pub fn observations(&self) -> &[LoggedObservation] {
        self.metrics.as_deref().unwrap_or_default()
    }

    /// `None` unless the record is a JSON object.
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        Some(Self {
            fetched_at: str_field(obj, "fetched_at"),
            source: str_field(obj, "source"),
            url: str_field(obj, "url"),
            content_hash: str_field(obj, "content_hash"),
            metrics: obj.get("metrics").and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .map(LoggedObservation::from_value)
                    .collect()
            }),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggedObservation {
    pub metric_key: Option<String>,
    pub entity: Option<String>,
    pub value: Option<Value>,
    pub unit: Option<String>,
    pub evidence: Option<String>,
}

impl LoggedObservation {
    /// Numeric value, if present and finite.
    pub fn value_f64(&self) -> Option<f64> {
        self.value
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    /// Non-object items yield an observation with every field empty.
    pub fn from_value(v: &Value) -> Self {
        let Some(obj) = v.as_object() else {
            return Self::default();
        };
        Self {
            metric_key: str_field(obj, "metric_key"),
            entity: str_field(obj, "entity"),
            value: obj.get("value").filter(|v| !v.is_null()).cloned(),
            unit: str_field(obj, "unit"),
            evidence: str_field(obj, "evidence"),
        }
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

impl SnapshotLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one snapshot as a single line.
    pub fn append(&self, snapshot: &Snapshot) -> Result<()> {
        let mut line = serde_json::to_string(snapshot).context("serializing snapshot")?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;

        // Torn last record from an interrupted run: terminate it first.
        if ends_without_newline(&mut f)? {
            line.insert(0, '\n');
        }
        f.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))?;
        f.sync_data()
            .with_context(|| format!("syncing {}", self.path.display()))?;
        Ok(())
    }

    /// Lazily read all records in append order. A missing file is empty history.
    pub fn scan(&self) -> Result<SnapshotIter> {
        let reader = match File::open(&self.path) {
            Ok(f) => Some(BufReader::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("opening {}", self.path.display()));
            }
        };
        Ok(SnapshotIter {
            reader,
            line_no: 0,
            buf: Vec::new(),
        })
    }
}

fn ends_without_newline(f: &mut File) -> io::Result<bool> {
    if f.metadata()?.len() == 0 {
        return Ok(false);
    }
    f.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

pub struct SnapshotIter {
    reader: Option<BufReader<File>>,
    line_no: usize,
    buf: Vec<u8>,
}

impl Iterator for SnapshotIter {
    type Item = LoggedSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        loop {
            self.buf.clear();
            match reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(line = self.line_no + 1, error = %e, "snapshot log read failed, stopping scan");
                    self.reader = None;
                    return None;
                }
            }
            self.line_no += 1;

            let trimmed = self.buf.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_slice::<Value>(trimmed) {
                Ok(v) => match LoggedSnapshot::from_value(&v) {
                    Some(s) => return Some(s),
                    None => {
                        tracing::warn!(line = self.line_no, "skipping snapshot record that is not an object");
                    }
                },
                Err(e) => {
                    tracing::warn!(line = self.line_no, error = %e, "skipping malformed snapshot record");
                }
            }
        }
    }
}

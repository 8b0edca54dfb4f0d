// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only metrics log.
//!
//! One sample per line:
//!
//! ```text
//! timestamp_ms,cpu_pct,mem_pct,disk_pct,net_rx_rate,net_tx_rate
//! ```
//!
//! Floats use Rust's shortest round-trip formatting so a reload reproduces
//! the exact values. An absent network rate is an empty field. Each append
//! is flushed and synced before it returns. Compaction rewrites the file
//! through a temp file and an atomic rename.

use berth_core::MetricSample;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FIELD_COUNT: usize = 6;
const MAX_BAK_FILES: u32 = 3;

/// Errors from log file operations.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    fn io(path: &Path, source: io::Error) -> Self {
        LogError::Io { path: path.to_path_buf(), source }
    }
}

/// Why a single line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected {expected} fields, found {0}", expected = FIELD_COUNT)]
    FieldCount(usize),
    #[error("invalid {field}: {value:?}")]
    Field { field: &'static str, value: String },
    #[error("line is not valid UTF-8")]
    Encoding,
}

/// Samples recovered from disk plus a count of lines that were skipped.
#[derive(Debug, Default)]
pub struct LoadedLog {
    pub samples: Vec<MetricSample>,
    pub corrupt_lines: usize,
}

pub fn encode_line(sample: &MetricSample) -> String {
    let rate = |r: Option<f64>| r.map(|v| v.to_string()).unwrap_or_default();
    format!(
        "{},{},{},{},{},{}",
        sample.ts_ms,
        sample.cpu_pct,
        sample.mem_pct,
        sample.disk_pct,
        rate(sample.net_rx_rate),
        rate(sample.net_tx_rate),
    )
}

pub fn decode_line(line: &str) -> Result<MetricSample, LineError> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(LineError::FieldCount(fields.len()));
    }

    let invalid = |field: &'static str, value: &str| LineError::Field { field, value: value.to_string() };
    let float = |field: &'static str, value: &str| value.parse::<f64>().map_err(|_| invalid(field, value));
    let rate = |field: &'static str, value: &str| {
        if value.is_empty() {
            Ok(None)
        } else {
            float(field, value).map(Some)
        }
    };

    Ok(MetricSample {
        ts_ms: fields[0].parse().map_err(|_| invalid("timestamp", fields[0]))?,
        cpu_pct: float("cpu_pct", fields[1])?,
        mem_pct: float("mem_pct", fields[2])?,
        disk_pct: float("disk_pct", fields[3])?,
        net_rx_rate: rate("net_rx_rate", fields[4])?,
        net_tx_rate: rate("net_tx_rate", fields[5])?,
    })
}

/// Read every decodable sample from `path`.
///
/// A missing file is an empty log. Undecodable lines are skipped and logged;
/// they never abort the load.
pub fn load(path: &Path) -> Result<LoadedLog, LogError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadedLog::default()),
        Err(e) => return Err(LogError::io(path, e)),
    };

    let mut loaded = LoadedLog::default();
    for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        if raw.is_empty() {
            continue;
        }
        let decoded = std::str::from_utf8(raw).map_err(|_| LineError::Encoding).and_then(decode_line);
        match decoded {
            Ok(sample) => loaded.samples.push(sample),
            Err(e) => {
                loaded.corrupt_lines += 1;
                tracing::warn!(path = %path.display(), line = index + 1, error = %e, "skipping corrupt metrics line");
            }
        }
    }
    Ok(loaded)
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

/// Writable handle on the metrics log.
#[derive(Debug)]
pub struct MetricsLog {
    path: PathBuf,
    file: File,
    appended_since_rewrite: usize,
}

impl MetricsLog {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// A trailing partial line left by a crash is terminated so the next
    /// append starts on a fresh line.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LogError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| LogError::io(&path, e))?;

        if ends_with_partial_line(&mut file).map_err(|e| LogError::io(&path, e))? {
            file.write_all(b"\n").map_err(|e| LogError::io(&path, e))?;
        }

        Ok(Self { path, file, appended_since_rewrite: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends since the last rewrite (or open).
    pub fn appended_since_rewrite(&self) -> usize {
        self.appended_since_rewrite
    }

    /// Append one sample durably.
    pub fn append(&mut self, sample: &MetricSample) -> Result<(), LogError> {
        let mut line = encode_line(sample);
        line.push('\n');
        self.file.write_all(line.as_bytes()).map_err(|e| LogError::io(&self.path, e))?;
        self.file.flush().map_err(|e| LogError::io(&self.path, e))?;
        self.file.sync_data().map_err(|e| LogError::io(&self.path, e))?;
        self.appended_since_rewrite += 1;
        Ok(())
    }

    /// Replace the file contents with exactly `samples`.
    ///
    /// Written to a sibling temp file, synced, then renamed over the log, so a
    /// crash leaves either the old or the new contents.
    pub fn rewrite(&mut self, samples: &[MetricSample]) -> Result<(), LogError> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut out = File::create(&tmp).map_err(|e| LogError::io(&tmp, e))?;
            let mut buf = String::with_capacity(samples.len() * 48);
            for sample in samples {
                buf.push_str(&encode_line(sample));
                buf.push('\n');
            }
            out.write_all(buf.as_bytes()).map_err(|e| LogError::io(&tmp, e))?;
            out.sync_all().map_err(|e| LogError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| LogError::io(&self.path, e))?;

        self.file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LogError::io(&self.path, e))?;
        self.appended_since_rewrite = 0;
        Ok(())
    }

    /// Copy the current file aside before a rewrite drops unreadable lines.
    pub fn backup(&self) -> Result<PathBuf, LogError> {
        let bak = rotate_bak_path(&self.path);
        fs::copy(&self.path, &bak).map_err(|e| LogError::io(&bak, e))?;
        Ok(bak)
    }
}

fn ends_with_partial_line(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;

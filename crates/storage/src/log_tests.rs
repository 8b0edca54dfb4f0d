// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use tempfile::tempdir;
use yare::parameterized;

fn sample(ts_ms: u64, rx: Option<f64>) -> MetricSample {
    MetricSample {
        ts_ms,
        cpu_pct: 12.5,
        mem_pct: 48.125,
        disk_pct: 71.0,
        net_rx_rate: rx,
        net_tx_rate: rx.map(|r| r / 4.0),
    }
}

#[test]
fn test_encode_line_format() {
    assert_eq!(encode_line(&sample(1_700_000_000_000, Some(1000.0))), "1700000000000,12.5,48.125,71,1000,250");
    assert_eq!(encode_line(&sample(5, None)), "5,12.5,48.125,71,,");
}

#[test]
fn test_decode_preserves_exact_floats() {
    let original = MetricSample {
        ts_ms: 42,
        cpu_pct: 0.1 + 0.2,
        mem_pct: 1.0 / 3.0,
        disk_pct: 99.99999999999999,
        net_rx_rate: Some(123456.789),
        net_tx_rate: None,
    };
    assert_eq!(decode_line(&encode_line(&original)).unwrap(), original);
}

#[parameterized(
    too_few = { "1,2,3,4,5", LineError::FieldCount(5) },
    too_many = { "1,2,3,4,5,6,7", LineError::FieldCount(7) },
    bad_ts = { "abc,1,2,3,,", LineError::Field { field: "timestamp", value: "abc".into() } },
    negative_ts = { "-5,1,2,3,,", LineError::Field { field: "timestamp", value: "-5".into() } },
    bad_cpu = { "1,x,2,3,,", LineError::Field { field: "cpu_pct", value: "x".into() } },
    empty_disk = { "1,1,2,,,", LineError::Field { field: "disk_pct", value: "".into() } },
    bad_rate = { "1,1,2,3,fast,", LineError::Field { field: "net_rx_rate", value: "fast".into() } },
)]
fn test_decode_rejects(line: &str, expected: LineError) {
    assert_eq!(decode_line(line).unwrap_err(), expected);
}

#[test]
fn test_open_creates_file_and_parent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("metrics.log");

    let log = MetricsLog::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(log.path(), path.as_path());
    assert_eq!(log.appended_since_rewrite(), 0);
}

#[test]
fn test_append_then_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.log");

    let mut log = MetricsLog::open(&path).unwrap();
    log.append(&sample(1, None)).unwrap();
    log.append(&sample(2, Some(10.0))).unwrap();
    assert_eq!(log.appended_since_rewrite(), 2);

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.samples, vec![sample(1, None), sample(2, Some(10.0))]);
    assert_eq!(loaded.corrupt_lines, 0);
}

#[test]
fn test_load_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let loaded = load(&dir.path().join("absent.log")).unwrap();
    assert!(loaded.samples.is_empty());
    assert_eq!(loaded.corrupt_lines, 0);
}

#[test]
fn test_load_skips_corrupt_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.log");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{}", encode_line(&sample(1, None))).unwrap();
        writeln!(f, "garbage line").unwrap();
        f.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        writeln!(f, "{}", encode_line(&sample(3, Some(5.0)))).unwrap();
    }

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.samples, vec![sample(1, None), sample(3, Some(5.0))]);
    assert_eq!(loaded.corrupt_lines, 2);
}

#[test]
fn test_open_terminates_partial_trailing_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.log");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{}", encode_line(&sample(1, None))).unwrap();
        write!(f, "2,12.5,48").unwrap();
    }

    let mut log = MetricsLog::open(&path).unwrap();
    log.append(&sample(3, None)).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.samples, vec![sample(1, None), sample(3, None)]);
    assert_eq!(loaded.corrupt_lines, 1);
}

#[test]
fn test_rewrite_replaces_contents_and_keeps_appending() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.log");

    let mut log = MetricsLog::open(&path).unwrap();
    for ts in 1..=5 {
        log.append(&sample(ts, None)).unwrap();
    }
    log.rewrite(&[sample(4, None), sample(5, None)]).unwrap();
    assert_eq!(log.appended_since_rewrite(), 0);

    log.append(&sample(6, None)).unwrap();

    let loaded = load(&path).unwrap();
    let ts: Vec<u64> = loaded.samples.iter().map(|s| s.ts_ms).collect();
    assert_eq!(ts, vec![4, 5, 6]);
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_backup_rotates_bak_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.log");
    let log = MetricsLog::open(&path).unwrap();

    for round in 1u8..=4 {
        std::fs::write(&path, vec![round; 8]).unwrap();
        log.backup().unwrap();
    }

    assert_eq!(std::fs::read(path.with_extension("bak")).unwrap(), vec![4u8; 8]);
    assert_eq!(std::fs::read(path.with_extension("bak.2")).unwrap(), vec![3u8; 8]);
    assert_eq!(std::fs::read(path.with_extension("bak.3")).unwrap(), vec![2u8; 8]);
    assert!(!path.with_extension("bak.4").exists());
}

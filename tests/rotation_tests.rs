//! Rotation, retention and compression tests
//!
//! Time-based scenarios drive the sink directly with fabricated record
//! timestamps, which is what the engine hands it in production; size-based
//! and retention scenarios run through the full engine.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone};
use logpipe::prelude::*;
use logpipe::sinks::{FileSink, FileSinkConfig};
use tempfile::TempDir;

fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
}

fn sink(path: &Path, rotation: Rotation, retention: Retention, compression: bool) -> FileSink {
    FileSink::new(FileSinkConfig {
        path: path.to_path_buf(),
        rotation,
        retention,
        compression,
        enqueue: false,
        handler_id: 0,
    })
    .expect("create sink")
}

#[test]
fn test_daily_rotation_across_midnight() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let sink = sink(&path, Rotation::Daily, Retention::None, false);

    sink.write("A", ts(2025, 1, 1, 23, 59, 59)).unwrap();
    sink.write("B", ts(2025, 1, 2, 0, 0, 0)).unwrap();
    sink.flush().unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("app.2025-01-01.log")).unwrap(),
        "A\n"
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "B\n");
}

#[test]
fn test_hourly_rotation_tag_includes_hour() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("svc.log");
    let sink = sink(&path, Rotation::Hourly, Retention::None, false);

    sink.write("first hour", ts(2025, 6, 7, 14, 30, 0)).unwrap();
    sink.write("second hour", ts(2025, 6, 7, 15, 0, 1)).unwrap();
    sink.write("third hour", ts(2025, 6, 7, 16, 59, 59)).unwrap();
    sink.flush().unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("svc.2025-06-07_14.log")).unwrap(),
        "first hour\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("svc.2025-06-07_15.log")).unwrap(),
        "second hour\n"
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "third hour\n");
}

#[test]
fn test_size_rotation_with_count_retention_via_engine() {
    // Rotation at 100 B with two retained segments, ten 30-byte records.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");

    let engine = Engine::new();
    engine
        .file(&path)
        .level("TRACE")
        .format("{message}")
        .rotation("100 B")
        .retention(2usize)
        .add()
        .unwrap();

    // 29 chars + newline = 30 bytes each.
    for i in 0..10 {
        engine.info(format!("record-{:02}-abcdefghijklmnopqr", i));
    }
    engine.complete().unwrap();

    let mut rotated = 0;
    let mut total = String::new();
    for entry in fs::read_dir(dir.path()).unwrap() {
        let p = entry.unwrap().path();
        if p != path {
            rotated += 1;
        }
        total.push_str(&fs::read_to_string(&p).unwrap());
    }

    assert!(rotated <= 2, "retention must cap rotated files, got {}", rotated);
    // The survivors hold the most recent records; the newest is always in
    // the active file.
    assert!(total.contains("record-09"));
    assert!(fs::read_to_string(&path).unwrap().contains("record-09"));
}

#[test]
fn test_size_rotation_preserves_order_without_retention() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ordered.log");

    let engine = Engine::new();
    engine
        .file(&path)
        .level("TRACE")
        .format("{message}")
        .rotation("100 B")
        .add()
        .unwrap();

    for i in 0..10 {
        engine.info(format!("record-{:02}-abcdefghijklmnopqr", i));
    }
    engine.complete().unwrap();

    // Collect every line from every segment; all ten records survive.
    let mut lines = Vec::new();
    for entry in fs::read_dir(dir.path()).unwrap() {
        let content = fs::read_to_string(entry.unwrap().path()).unwrap();
        lines.extend(content.lines().map(str::to_string));
    }
    lines.sort();
    assert_eq!(lines.len(), 10);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.starts_with(&format!("record-{:02}", i)));
    }
}

#[test]
fn test_active_file_stays_under_threshold() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cap.log");
    let sink = sink(&path, Rotation::Size(100), Retention::None, false);

    let line = "y".repeat(30);
    for i in 0..20 {
        sink.write(&line, ts(2025, 1, 1, 0, 0, i)).unwrap();
    }
    sink.flush().unwrap();

    // Immediately after any rotation the active file restarts at zero, and
    // no segment ever exceeds threshold + one record.
    for entry in fs::read_dir(dir.path()).unwrap() {
        let p = entry.unwrap().path();
        let size = fs::metadata(&p).unwrap().len();
        assert!(size <= 100 + 31, "{} has {} bytes", p.display(), size);
    }
}

#[test]
fn test_retention_by_age() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("aged.log");

    // Plant two stale rotated segments with old mtimes.
    let old_a = dir.path().join("aged.2024-01-01.log");
    let old_b = dir.path().join("aged.2024-01-02.log");
    fs::write(&old_a, "ancient\n").unwrap();
    fs::write(&old_b, "ancient\n").unwrap();
    let long_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(86_400 * 30);
    for p in [&old_a, &old_b] {
        let file = fs::OpenOptions::new().write(true).open(p).unwrap();
        file.set_times(fs::FileTimes::new().set_modified(long_ago)).unwrap();
    }

    let sink = sink(
        &path,
        Rotation::Daily,
        Retention::Age(chrono::Duration::days(7)),
        false,
    );
    // Trigger one rotation so retention runs. The age cutoff compares real
    // file mtimes, so anchor the record timestamps to the real clock.
    let now = Local::now();
    sink.write("old", now).unwrap();
    sink.write("new", now + chrono::Duration::days(1)).unwrap();
    sink.flush().unwrap();

    assert!(!old_a.exists(), "stale segment should be deleted");
    assert!(!old_b.exists(), "stale segment should be deleted");
    assert!(path.exists());
}

#[test]
fn test_compressed_segment_is_valid_gzip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zip.log");
    let sink = sink(&path, Rotation::Daily, Retention::None, true);

    sink.write("compressed payload", ts(2025, 1, 1, 9, 0, 0)).unwrap();
    sink.write("fresh", ts(2025, 1, 2, 9, 0, 0)).unwrap();
    sink.flush().unwrap();

    let gz_path = dir.path().join("zip.2025-01-01.log.gz");
    assert!(gz_path.exists());
    assert!(!dir.path().join("zip.2025-01-01.log").exists());

    let mut decoder = flate2::read::GzDecoder::new(fs::File::open(&gz_path).unwrap());
    let mut restored = String::new();
    decoder.read_to_string(&mut restored).unwrap();
    assert_eq!(restored, "compressed payload\n");
}

#[test]
fn test_retention_counts_compressed_segments() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("both.log");
    let sink = sink(&path, Rotation::Daily, Retention::Count(1), true);

    sink.write("d1", ts(2025, 1, 1, 0, 0, 0)).unwrap();
    sink.write("d2", ts(2025, 1, 2, 0, 0, 0)).unwrap();
    sink.write("d3", ts(2025, 1, 3, 0, 0, 0)).unwrap();
    sink.flush().unwrap();

    let rotated: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| *p != path)
        .collect();
    assert_eq!(rotated.len(), 1, "kept: {:?}", rotated);
}

#[test]
fn test_restart_resumes_size_ordinals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("restart.log");

    {
        let sink = sink(&path, Rotation::Size(20), Retention::None, false);
        sink.write("aaaaaaaaaaaaaaaaaaaa", ts(2025, 1, 1, 0, 0, 0)).unwrap();
        sink.write("bbbbbbbbbbbbbbbbbbbb", ts(2025, 1, 1, 0, 0, 1)).unwrap();
        sink.flush().unwrap();
    }
    assert!(dir.path().join("restart.1.log").exists());

    // New process, same path: next rotation must not clobber segment 1.
    {
        let sink = sink(&path, Rotation::Size(20), Retention::None, false);
        sink.write("cccccccccccccccccccc", ts(2025, 1, 1, 0, 1, 0)).unwrap();
        sink.write("dddddddddddddddddddd", ts(2025, 1, 1, 0, 1, 1)).unwrap();
        sink.flush().unwrap();
    }

    assert!(dir.path().join("restart.2.log").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("restart.1.log")).unwrap(),
        "aaaaaaaaaaaaaaaaaaaa\n"
    );
}

#[test]
fn test_rotation_never_splits_a_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("whole.log");
    let sink = sink(&path, Rotation::Size(64), Retention::None, false);

    for i in 0..50 {
        sink.write(&format!("intact-record-{:04}", i), ts(2025, 1, 1, 0, 0, 0))
            .unwrap();
    }
    sink.flush().unwrap();

    for entry in fs::read_dir(dir.path()).unwrap() {
        let content = fs::read_to_string(entry.unwrap().path()).unwrap();
        for line in content.lines() {
            assert!(line.starts_with("intact-record-"), "split line: {:?}", line);
        }
    }
}

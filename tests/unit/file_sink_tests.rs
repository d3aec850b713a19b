//! Unit tests for `FileLineSink`.
//!
//! Validates append semantics, directory creation, daily file naming and
//! rollover, the JSONL layout, and closure behaviour.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Days, NaiveDate, Utc};
use linecast::sink::{FileLineSink, LineFormat};
use linecast::{LineSink, SinkError};

#[test]
fn open_creates_missing_parent_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("dir").join("out.log");

    let sink = FileLineSink::open(path.clone()).expect("open must create parents");
    sink.write_line("hello").expect("write");

    assert_eq!(fs::read_to_string(&path).expect("read"), "hello\n");
}

#[test]
fn lines_are_appended_to_existing_content() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("out.log");
    fs::write(&path, "earlier\n").expect("seed");

    let sink = FileLineSink::open(path.clone()).expect("open");
    sink.write_line("first").expect("write");
    sink.write_line("second").expect("write");

    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "earlier\nfirst\nsecond\n"
    );
}

#[test]
fn every_line_is_flushed_before_returning() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("out.log");
    let sink = FileLineSink::open(path.clone()).expect("open");

    sink.write_line("visible").expect("write");

    // Still open: content must already be on disk.
    assert_eq!(fs::read_to_string(&path).expect("read"), "visible\n");
}

#[test]
fn write_after_close_is_a_closure_signal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let sink = FileLineSink::open(temp.path().join("out.log")).expect("open");

    sink.close().expect("close");
    let err = sink.write_line("late").expect_err("closed sink must refuse writes");

    assert!(matches!(err, SinkError::ConsumerClosed(_)), "got {err:?}");
    sink.close().expect("closing twice is harmless");
}

#[test]
fn daily_sink_names_file_after_today() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("logs");
    let sink = FileLineSink::daily(dir.clone(), "build").expect("daily");

    assert!(dir.exists(), "directory is created eagerly");
    sink.write_line("compiling").expect("write");

    let expected = dir.join(format!("build-{}.log", Utc::now().date_naive()));
    assert_eq!(sink.current_path(), expected);
    assert_eq!(fs::read_to_string(&expected).expect("read"), "compiling\n");
}

#[test]
fn daily_sink_opens_no_file_before_first_write() {
    let temp = tempfile::tempdir().expect("tempdir");
    let sink = FileLineSink::daily(temp.path().to_owned(), "idle").expect("daily");

    sink.close().expect("close");

    let entries = fs::read_dir(temp.path()).expect("read_dir").count();
    assert_eq!(entries, 0);
}

#[test]
fn jsonl_format_writes_one_object_per_line() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("out.jsonl");
    let sink = FileLineSink::open(path.clone())
        .expect("open")
        .with_format(LineFormat::Jsonl);

    sink.write_line("with \"quotes\"").expect("write");
    sink.write_line("second").expect("write");

    let content = fs::read_to_string(&path).expect("read");
    let records: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid json"))
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["line"], "with \"quotes\"");
    assert_eq!(records[1]["line"], "second");
    assert!(records[0]["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
}

#[test]
fn name_reflects_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("named.log");
    let sink = FileLineSink::open(path.clone()).expect("open");

    assert_eq!(sink.name(), format!("file:{}", path.display()));
}

#[test]
fn daily_sink_switches_file_when_date_changes() {
    static DAY_OFFSET: AtomicU64 = AtomicU64::new(0);

    fn fake_today() -> NaiveDate {
        let base = NaiveDate::from_ymd_opt(2026, 3, 31).expect("valid date");
        let offset = DAY_OFFSET.load(Ordering::SeqCst);
        base.checked_add_days(Days::new(offset)).expect("in range")
    }

    let temp = tempfile::tempdir().expect("tempdir");
    let sink = FileLineSink::daily(temp.path().to_owned(), "run")
        .expect("daily")
        .with_clock(fake_today);

    sink.write_line("day one").expect("write");
    sink.write_line("day one again").expect("write");
    DAY_OFFSET.store(1, Ordering::SeqCst);
    assert_eq!(sink.current_path(), temp.path().join("run-2026-04-01.log"));
    sink.write_line("day two").expect("write after rollover");
    sink.close().expect("close");

    assert_eq!(
        fs::read_to_string(temp.path().join("run-2026-03-31.log")).expect("first day"),
        "day one\nday one again\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("run-2026-04-01.log")).expect("second day"),
        "day two\n"
    );
}

#[test]
fn fixed_file_ignores_date_changes() {
    static DAY_OFFSET: AtomicU64 = AtomicU64::new(0);

    fn fake_today() -> NaiveDate {
        let base = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        let offset = DAY_OFFSET.load(Ordering::SeqCst);
        base.checked_add_days(Days::new(offset)).expect("in range")
    }

    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("fixed.log");
    let sink = FileLineSink::open(path.clone()).expect("open").with_clock(fake_today);

    sink.write_line("before").expect("write");
    DAY_OFFSET.store(3, Ordering::SeqCst);
    sink.write_line("after").expect("write");

    assert_eq!(fs::read_to_string(&path).expect("read"), "before\nafter\n");
    assert_eq!(fs::read_dir(temp.path()).expect("read_dir").count(), 1);
}

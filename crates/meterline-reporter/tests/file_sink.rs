#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;
use std::path::Path;

use meterline_core::{CounterStats, MetricId, MetricStats, RequestTiming, TimingEntry, TimingTree};
use meterline_reporter::config::FileSinkConfig;
use meterline_reporter::cycle::ReportBatch;
use meterline_reporter::sinks::{MetricSink, RotatingFileSink};

const DAY_MS: u64 = 86_400_000;
// 2023-11-14T22:13:20Z
const T0: u64 = 1_700_000_000_000;

fn cfg(dir: &Path, keep: usize) -> FileSinkConfig {
    FileSinkConfig {
        enabled: true,
        directory: dir.to_string_lossy().into_owned(),
        base_file_name: "app".into(),
        extension: "csv".into(),
        keep_files: keep,
        timestamp_format: "%Y%m%d".into(),
    }
}

fn batch(at: u64, count: u64) -> ReportBatch {
    ReportBatch {
        collected_at_millis: at,
        stats: vec![MetricStats::Counter(CounterStats {
            id: MetricId::new("orders"),
            count,
        })],
        timings: Vec::new(),
        timing_threshold_percent: 0.0,
    }
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn appends_within_one_stamp() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = RotatingFileSink::new(&cfg(tmp.path(), 3)).unwrap();

    sink.report(&batch(T0, 1)).unwrap();
    sink.report(&batch(T0 + 1_000, 2)).unwrap();

    assert_eq!(listing(tmp.path()), vec!["app-20231114.csv"]);
    let body = fs::read_to_string(tmp.path().join("app-20231114.csv")).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("time,type,name"));
    assert_eq!(lines[1], "2023-11-14T22:13:20.000Z,counter,orders,,1,,,,,");
    assert!(lines[2].contains(",orders,,2,"));
}

#[test]
fn rotation_keeps_newest_files() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("unrelated.txt"), "keep me").unwrap();
    let sink = RotatingFileSink::new(&cfg(tmp.path(), 2)).unwrap();

    for day in 0..4 {
        sink.report(&batch(T0 + day * DAY_MS, day + 1)).unwrap();
    }

    assert_eq!(
        listing(tmp.path()),
        vec!["app-20231116.csv", "app-20231117.csv", "unrelated.txt"]
    );
}

#[test]
fn reopening_an_existing_file_does_not_repeat_the_header() {
    let tmp = tempfile::tempdir().unwrap();
    RotatingFileSink::new(&cfg(tmp.path(), 3))
        .unwrap()
        .report(&batch(T0, 1))
        .unwrap();
    RotatingFileSink::new(&cfg(tmp.path(), 3))
        .unwrap()
        .report(&batch(T0, 2))
        .unwrap();

    let body = fs::read_to_string(tmp.path().join("app-20231114.csv")).unwrap();
    assert_eq!(body.lines().filter(|l| l.starts_with("time,")).count(), 1);
    assert_eq!(body.lines().count(), 3);
}

#[test]
fn request_timings_go_to_their_own_file_set() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = RotatingFileSink::new(&cfg(tmp.path(), 1)).unwrap();

    let timing = RequestTiming::new(
        vec![
            TimingEntry::new(0, 0, MetricId::new("GET /"), 0, Some(10_000_000)),
            TimingEntry::new(1, 1, MetricId::new("render"), 1_000_000, Some(4_000_000)),
        ],
        T0,
    );
    let mut b = batch(T0, 1);
    b.timings.push(TimingTree::build(&timing));
    sink.report(&b).unwrap();

    // metrics and requests rotate independently with keep_files = 1
    let mut next = batch(T0 + DAY_MS, 1);
    next.timings = b.timings.clone();
    sink.report(&next).unwrap();

    assert_eq!(
        listing(tmp.path()),
        vec!["app-20231115.csv", "app-requests-20231115.csv"]
    );
    let body = fs::read_to_string(tmp.path().join("app-requests-20231115.csv")).unwrap();
    let rows: Vec<&str> = body.lines().collect();
    assert!(rows[0].starts_with("time,request_start,depth"));
    assert!(rows[1].ends_with(",GET /,ok"), "{}", rows[1]);
    assert!(rows[2].contains(",1,30.0,3000,3000,render,ok"), "{}", rows[2]);
}

#[test]
fn directory_problems_fail_at_construction() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("plain-file");
    fs::write(&file, "x").unwrap();

    let err = match RotatingFileSink::new(&cfg(&file, 2)) {
        Ok(_) => panic!("a file is not a directory"),
        Err(e) => e,
    };
    assert_eq!(err.kind().as_str(), "CONFIG");

    let mut bad_format = cfg(tmp.path(), 2);
    bad_format.timestamp_format = "%Q".into();
    assert!(RotatingFileSink::new(&bad_format).is_err());
}

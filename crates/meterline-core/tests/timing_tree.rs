//! Request timing tree reconstruction.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use meterline_core::wire::{csv, json};
use meterline_core::{MetricId, RequestTiming, RequestTimingRecorder, TimingEntry, TimingTree};

const MS: u64 = 1_000_000;

fn entry(order: u32, name: &str, start_ms: u64, end_ms: Option<u64>) -> TimingEntry {
    TimingEntry::new(order, 0, MetricId::new(name), start_ms * MS, end_ms.map(|e| e * MS))
}

fn names(tree: &TimingTree) -> Vec<(usize, String)> {
    tree.lines(0.0)
        .iter()
        .map(|l| (l.node.depth, l.node.entry.id.name().to_string()))
        .collect()
}

#[test]
fn three_nested_spans() {
    // start order A(0) -> B(10) -> C(30); end order C(80) -> B(100) -> A(150)
    let timing = RequestTiming::new(
        vec![
            entry(0, "A", 0, Some(150)),
            entry(1, "B", 10, Some(100)),
            entry(2, "C", 30, Some(80)),
        ],
        1_700_000_000_000,
    );
    let tree = TimingTree::build(&timing);

    assert_eq!(tree.roots().count(), 1);
    let a = tree.root().unwrap();
    assert_eq!(a.entry.id.name(), "A");
    assert_eq!(a.children.len(), 1);
    let b = tree.children(a).next().unwrap();
    assert_eq!(b.entry.id.name(), "B");
    assert_eq!(b.parent, Some(0));
    assert_eq!(b.children.len(), 1);
    let c = tree.children(b).next().unwrap();
    assert_eq!(c.entry.id.name(), "C");
    assert!(c.children.is_empty());

    assert_eq!(a.self_nanos, Some(60 * MS));
    assert_eq!(b.self_nanos, Some(40 * MS));
    assert_eq!(c.self_nanos, Some(50 * MS));
    assert!(!tree.has_anomalies());
    assert_eq!(tree.total_nanos(), Some(150 * MS));
}

#[test]
fn entries_out_of_order_are_sorted_by_start() {
    let timing = RequestTiming::new(
        vec![
            entry(2, "C", 30, Some(80)),
            entry(0, "A", 0, Some(150)),
            entry(3, "D", 110, Some(140)),
            entry(1, "B", 10, Some(100)),
        ],
        0,
    );
    let tree = TimingTree::build(&timing);
    assert_eq!(
        names(&tree),
        vec![
            (0, "A".to_string()),
            (1, "B".to_string()),
            (2, "C".to_string()),
            (1, "D".to_string()),
        ]
    );
    let a = tree.root().unwrap();
    assert_eq!(a.self_nanos, Some((150 - 90 - 30) * MS));
}

#[test]
fn incomplete_span_is_marked_not_measured() {
    let timing = RequestTiming::new(
        vec![
            entry(0, "root", 0, Some(100)),
            entry(1, "load", 10, Some(40)),
            entry(2, "save", 50, None),
        ],
        0,
    );
    let tree = TimingTree::build(&timing);
    let root = tree.root().unwrap();
    assert_eq!(root.children.len(), 2);

    let save = tree.children(root).nth(1).unwrap();
    assert!(!save.is_complete());
    assert_eq!(save.self_nanos, None);
    // unknown child duration makes the parent's self time unknown
    assert_eq!(root.self_nanos, None);
    assert!(tree.has_anomalies());

    let text = tree.render_text(0.0);
    assert!(text.contains("save  [did not complete]"), "{text}");
    assert!(text.contains("  load  total=30.000ms"), "{text}");
}

#[test]
fn overlapping_siblings_are_flagged() {
    // B and C overlap inside A, their sum exceeds A's duration
    let timing = RequestTiming::new(
        vec![
            entry(0, "A", 0, Some(100)),
            entry(1, "B", 0, Some(70)),
            entry(2, "C", 20, Some(90)),
        ],
        0,
    );
    let tree = TimingTree::build(&timing);
    let a = tree.root().unwrap();
    assert_eq!(a.children.len(), 2);
    assert_eq!(a.self_nanos, Some(0));
    assert_eq!(a.overlap_nanos, Some(40 * MS));
    assert!(tree.has_anomalies());
    assert!(tree.render_text(0.0).contains("[overlap +40.000ms]"));
}

#[test]
fn spans_outside_root_become_trailing_roots() {
    let timing = RequestTiming::new(
        vec![entry(0, "first", 0, Some(10)), entry(1, "second", 20, Some(30))],
        0,
    );
    let tree = TimingTree::build(&timing);
    assert_eq!(tree.roots().count(), 2);
    assert_eq!(tree.root().unwrap().entry.id.name(), "first");
}

#[test]
fn identical_intervals_nest_in_record_order() {
    let timing = RequestTiming::new(
        vec![entry(0, "outer", 0, Some(10)), entry(1, "inner", 0, Some(10))],
        0,
    );
    let tree = TimingTree::build(&timing);
    assert_eq!(names(&tree), vec![(0, "outer".to_string()), (1, "inner".to_string())]);
    assert_eq!(tree.root().unwrap().self_nanos, Some(0));
    assert_eq!(tree.root().unwrap().overlap_nanos, None);
}

#[test]
fn threshold_hides_small_subtrees() {
    let timing = RequestTiming::new(
        vec![
            entry(0, "A", 0, Some(100)),
            entry(1, "big", 0, Some(60)),
            entry(2, "tiny", 1, Some(2)),
            entry(3, "small", 70, Some(73)),
        ],
        0,
    );
    let tree = TimingTree::build(&timing);
    let visible: Vec<String> = tree
        .lines(5.0)
        .iter()
        .map(|l| l.node.entry.id.name().to_string())
        .collect();
    assert_eq!(visible, vec!["A", "big"]);
    assert_eq!(tree.lines(0.0).len(), 4);
}

#[test]
fn csv_rows_for_tree() {
    let timing = RequestTiming::new(
        vec![entry(0, "A", 0, Some(100)), entry(1, "B", 10, None)],
        42,
    );
    let tree = TimingTree::build(&timing);
    let mut out = String::new();
    csv::write_timing_rows("t", &tree, 0.0, &mut out);
    let rows: Vec<&str> = out.lines().collect();
    assert_eq!(rows[0], "t,42,0,100.0,,100000,A,ok");
    assert_eq!(rows[1], "t,42,1,,,,B,incomplete");
}

#[test]
fn recorder_output_builds_a_tree() {
    let mut rec = RequestTimingRecorder::new();
    let outer = rec.start_span(MetricId::new("handler"));
    let inner = rec.start_span(MetricId::new("db"));
    rec.end_span(inner);
    rec.end_span(outer);

    let tree = TimingTree::build(&rec.finish());
    assert_eq!(names(&tree), vec![(0, "handler".to_string()), (1, "db".to_string())]);
    let root = tree.root().unwrap();
    assert!(root.self_nanos.is_some());
}

#[test]
fn deep_nesting_stays_off_the_call_stack() {
    const DEPTH: u64 = 10_000;
    // each span starts one ms after its parent and ends one ms before it
    let entries: Vec<TimingEntry> = (0..DEPTH)
        .map(|i| {
            TimingEntry::new(
                i as u32,
                0,
                MetricId::new(format!("level.{i}")),
                i * MS,
                Some((2 * DEPTH - i) * MS),
            )
        })
        .collect();
    let tree = TimingTree::build(&RequestTiming::new(entries, 7));

    assert_eq!(tree.len(), DEPTH as usize);
    assert_eq!(tree.roots().count(), 1);
    let deepest = &tree.nodes()[DEPTH as usize - 1];
    assert_eq!(deepest.depth, DEPTH as usize - 1);
    assert_eq!(deepest.self_nanos, Some(2 * MS));
    assert_eq!(tree.root().unwrap().self_nanos, Some(2 * MS));
    assert!(!tree.has_anomalies());

    assert_eq!(tree.lines(0.0).len(), DEPTH as usize);
    let text = tree.render_text(0.0);
    assert_eq!(text.lines().count(), DEPTH as usize);

    let mut rows = String::new();
    csv::write_timing_rows("t", &tree, 0.0, &mut rows);
    assert_eq!(rows.lines().count(), DEPTH as usize);

    let doc = json::timing_to_value(&tree);
    let encoded = serde_json::to_string(&doc).unwrap();
    let spans = doc["spans"].as_array().unwrap();
    assert_eq!(spans.len(), DEPTH as usize);
    assert_eq!(spans[DEPTH as usize - 1]["parent"], DEPTH - 2);
    assert!(encoded.len() > spans.len());

    let copy = tree.clone();
    assert_eq!(copy, tree);
    drop(copy);
    drop(tree);
}

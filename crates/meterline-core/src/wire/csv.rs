//! CSV rows for the rotating file sink.
//!
//! Metric rows: `time,type,name,tags,count,total_us,mean_us,max_us,value,bucket`.
//! Request timing rows: `time,request_start,depth,percent,self_us,total_us,name,status`.

use std::fmt::Write;

use crate::metric::MetricStats;
use crate::timing::TimingTree;

pub const METRICS_HEADER: &str = "time,type,name,tags,count,total_us,mean_us,max_us,value,bucket";
pub const TIMING_HEADER: &str = "time,request_start,depth,percent,self_us,total_us,name,status";

/// Append one row per statistics record.
pub fn write_metric_rows(time: &str, batch: &[MetricStats], out: &mut String) {
    for s in batch {
        let tags = s
            .id()
            .tags()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        let _ = write!(out, "{},{},{},{},", field(time), s.kind(), field(s.id().name()), field(&tags));
        match s {
            MetricStats::Counter(c) => {
                let _ = write!(out, "{},,,,,", c.count);
            }
            MetricStats::GaugeDouble(g) => {
                let _ = write!(out, ",,,,{},", g.value);
            }
            MetricStats::GaugeLong(g) => {
                let _ = write!(out, ",,,,{},", g.value);
            }
            MetricStats::Timer(t) => {
                let _ = write!(
                    out,
                    "{},{},{},{},,{}",
                    t.count,
                    t.total_micros(),
                    t.mean_micros(),
                    t.max_micros(),
                    field(t.bucket_range.as_deref().unwrap_or(""))
                );
            }
        }
        out.push('\n');
    }
}

/// Append one row per visible span of `tree`.
pub fn write_timing_rows(time: &str, tree: &TimingTree, threshold_percent: f64, out: &mut String) {
    for line in tree.lines(threshold_percent) {
        let n = line.node;
        let percent = line.percent.map(|p| format!("{p:.1}")).unwrap_or_default();
        let self_us = n.self_nanos.map(|s| (s / 1_000).to_string()).unwrap_or_default();
        let total_us = n.duration_nanos().map(|d| (d / 1_000).to_string()).unwrap_or_default();
        let status = if !n.is_complete() {
            "incomplete"
        } else if n.overlap_nanos.is_some() {
            "overlap"
        } else {
            "ok"
        };
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            field(time),
            tree.start_epoch_millis,
            n.depth,
            percent,
            self_us,
            total_us,
            field(&n.entry.id.to_string()),
            status
        );
    }
}

/// Quote a field if it contains a separator, quote, or newline.
fn field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

//! statsd line protocol.
//!
//! - counter: `name:count|c`
//! - timer:   `name:meanMillis|ms` (bucket windows append the range as a last segment)
//! - gauge:   `name:value|g` (negative values are sent as `0|g` then the value,
//!   since a leading `-` means "decrement" to statsd)
//!
//! Tags are appended in dogstatsd form (`|#k:v,k2:v2`) when enabled.

use std::fmt::Write;

use super::trim::trim_name;
use crate::metric::MetricStats;

/// Name budget used when none is configured.
pub const DEFAULT_MAX_NAME_BYTES: usize = 200;

#[derive(Debug, Clone)]
pub struct StatsdFormat {
    /// Prepended as `prefix.` before trimming.
    pub prefix: Option<String>,
    pub max_name_bytes: usize,
    pub include_tags: bool,
}

impl Default for StatsdFormat {
    fn default() -> Self {
        Self {
            prefix: None,
            max_name_bytes: DEFAULT_MAX_NAME_BYTES,
            include_tags: true,
        }
    }
}

/// Encode a batch, one entry per statsd line (no trailing newline).
pub fn encode_lines(batch: &[MetricStats], fmt: &StatsdFormat) -> Vec<String> {
    let mut lines = Vec::with_capacity(batch.len());
    for s in batch {
        encode_into(s, fmt, &mut lines);
    }
    lines
}

/// Encode one statistics record. Gauges may produce two lines.
pub fn encode_into(stats: &MetricStats, fmt: &StatsdFormat, lines: &mut Vec<String>) {
    let name = metric_name(stats, fmt);
    let tags = if fmt.include_tags { tag_suffix(stats) } else { String::new() };

    match stats {
        MetricStats::Counter(c) => lines.push(format!("{name}:{}|c{tags}", c.count)),
        MetricStats::Timer(t) => lines.push(format!("{name}:{}|ms{tags}", t.mean_millis())),
        MetricStats::GaugeLong(g) => {
            if g.value < 0 {
                lines.push(format!("{name}:0|g{tags}"));
            }
            lines.push(format!("{name}:{}|g{tags}", g.value));
        }
        MetricStats::GaugeDouble(g) => {
            if g.value < 0.0 {
                lines.push(format!("{name}:0|g{tags}"));
            }
            lines.push(format!("{name}:{}|g{tags}", g.value));
        }
    }
}

fn metric_name(stats: &MetricStats, fmt: &StatsdFormat) -> String {
    let mut full = String::new();
    if let Some(p) = fmt.prefix.as_deref().filter(|p| !p.is_empty()) {
        full.push_str(p);
        full.push('.');
    }
    full.push_str(stats.id().name());
    if let MetricStats::Timer(t) = stats {
        if let Some(range) = t.bucket_range.as_deref() {
            full.push('.');
            full.push_str(range);
        }
    }
    let trimmed = trim_name(&full, fmt.max_name_bytes);
    sanitize(trimmed, &[':', '|', '@', '#', '\n'])
}

fn tag_suffix(stats: &MetricStats) -> String {
    let tags = stats.id().tags();
    if tags.is_empty() {
        return String::new();
    }
    let mut out = String::from("|#");
    for (i, (k, v)) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(
            out,
            "{}:{}",
            sanitize(k, &[':', '|', ',', '#', '\n']),
            sanitize(v, &['|', ',', '#', '\n'])
        );
    }
    out
}

fn sanitize(s: &str, reserved: &[char]) -> String {
    s.chars()
        .map(|c| if reserved.contains(&c) { '_' } else { c })
        .collect()
}

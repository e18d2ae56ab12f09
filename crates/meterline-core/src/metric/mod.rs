//! Metric primitives and the statistics they produce.
//!
//! Every primitive is written from arbitrary application threads and
//! collected (snapshot-and-reset) from the single reporting thread. Writers
//! only touch atomics; nothing on the recording path locks or allocates.

mod bucket;
mod counter;
mod gauge;
mod timer;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::id::MetricId;

pub use bucket::BucketTimer;
pub use counter::Counter;
pub use gauge::{GaugeDouble, GaugeLong};
pub use timer::{TimedMetric, Timer};

/// Whether a collect should emit windows with no recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    /// Emit every metric, including all-zero windows.
    All,
    /// Skip metrics whose window recorded nothing.
    NonEmpty,
}

/// A live metric held by the registry.
pub trait Metric: Send + Sync {
    fn id(&self) -> &MetricId;

    /// Snapshot-and-reset, pushing zero or more statistics into `out`.
    fn collect(&self, mode: Collect, out: &mut Vec<MetricStats>);

    /// Discard the current window.
    fn reset(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct CounterStats {
    pub id: MetricId,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeDoubleStats {
    pub id: MetricId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeLongStats {
    pub id: MetricId,
    pub value: i64,
}

/// One timer window. Durations are nanoseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerStats {
    pub id: MetricId,
    /// Set for bucket timer sub-windows, e.g. `"100-200"` or `"300+"`.
    pub bucket_range: Option<Box<str>>,
    pub count: u64,
    pub total_nanos: u64,
    pub max_nanos: u64,
    pub mean_nanos: u64,
    pub window_start_millis: u64,
    pub window_end_millis: u64,
}

impl TimerStats {
    pub fn mean_millis(&self) -> u64 {
        round_div(self.mean_nanos, 1_000_000)
    }

    pub fn mean_micros(&self) -> u64 {
        round_div(self.mean_nanos, 1_000)
    }

    pub fn total_micros(&self) -> u64 {
        round_div(self.total_nanos, 1_000)
    }

    pub fn max_micros(&self) -> u64 {
        round_div(self.max_nanos, 1_000)
    }
}

/// Statistics produced by one collect, one variant per statistics shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricStats {
    Counter(CounterStats),
    GaugeDouble(GaugeDoubleStats),
    GaugeLong(GaugeLongStats),
    Timer(TimerStats),
}

impl MetricStats {
    pub fn id(&self) -> &MetricId {
        match self {
            MetricStats::Counter(s) => &s.id,
            MetricStats::GaugeDouble(s) => &s.id,
            MetricStats::GaugeLong(s) => &s.id,
            MetricStats::Timer(s) => &s.id,
        }
    }

    /// Short type label used by the text encoders.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricStats::Counter(_) => "counter",
            MetricStats::GaugeDouble(_) | MetricStats::GaugeLong(_) => "gauge",
            MetricStats::Timer(_) => "timer",
        }
    }
}

/// `round(n / d)` for non-negative integers; 0 when `d == 0`.
pub(crate) fn round_div(n: u64, d: u64) -> u64 {
    if d == 0 {
        return 0;
    }
    let q = n / d;
    let r = n % d;
    if r >= d - r {
        q + 1
    } else {
        q
    }
}

pub(crate) fn now_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

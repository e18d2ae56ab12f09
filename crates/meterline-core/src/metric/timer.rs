//! Duration accumulators.
//!
//! `Timer` keeps count/total/max as independent atomics. Writers add to
//! total and max before count; a collect swaps count first, then total and
//! max. Every event counted in a window therefore has its duration in that
//! window's total and max.
//!
//! A writer caught between its total and count updates lands its duration in
//! the window being taken and its count in the next. When that window counted
//! at least one event the extra duration stays there: the mean is skewed
//! upward and the max can read below the mean, in which case the reported max
//! falls back to the mean. When the window counted nothing, the swapped total
//! and max are added back so they are reported with the count that follows.
//! Across windows no duration is lost or counted twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::{now_epoch_millis, round_div, Collect, Metric, MetricStats, TimerStats};
use crate::id::MetricId;

/// Suffix appended to the identity of the error-outcome timer.
pub const ERROR_SUFFIX: &str = ".error";

/// Outcome-agnostic duration accumulator.
#[derive(Debug)]
pub struct Timer {
    id: MetricId,
    bucket_range: Option<Box<str>>,
    count: AtomicU64,
    total: AtomicU64,
    max: AtomicU64,
    window_start: AtomicU64,
}

impl Timer {
    pub fn new(id: MetricId) -> Self {
        Self::with_bucket_range(id, None)
    }

    pub(crate) fn with_bucket_range(id: MetricId, bucket_range: Option<Box<str>>) -> Self {
        Self {
            id,
            bucket_range,
            count: AtomicU64::new(0),
            total: AtomicU64::new(0),
            max: AtomicU64::new(0),
            window_start: AtomicU64::new(now_epoch_millis()),
        }
    }

    pub fn id(&self) -> &MetricId {
        &self.id
    }

    pub fn bucket_range(&self) -> Option<&str> {
        self.bucket_range.as_deref()
    }

    /// Record one completed event.
    pub fn record(&self, nanos: u64) {
        self.total.fetch_add(nanos, Ordering::Relaxed);
        self.max.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Events recorded in the current window.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Snapshot-and-reset the current window.
    pub fn take(&self) -> TimerStats {
        let now = now_epoch_millis();
        let window_start = self.window_start.swap(now, Ordering::AcqRel);
        // count first: see module docs for the ordering contract
        let count = self.count.swap(0, Ordering::AcqRel);
        let total = self.total.swap(0, Ordering::AcqRel);
        let raw_max = self.max.swap(0, Ordering::AcqRel);

        if count == 0 {
            if total > 0 || raw_max > 0 {
                // durations of writers that have not counted yet
                self.total.fetch_add(total, Ordering::AcqRel);
                self.max.fetch_max(raw_max, Ordering::AcqRel);
                tracing::trace!(metric = %self.id, total, raw_max, "carried uncounted durations");
            }
            return TimerStats {
                id: self.id.clone(),
                bucket_range: self.bucket_range.clone(),
                count: 0,
                total_nanos: 0,
                max_nanos: 0,
                mean_nanos: 0,
                window_start_millis: window_start,
                window_end_millis: now,
            };
        }

        let mean = round_div(total, count);
        let max = sanitized_max(raw_max, mean, count);
        if max != raw_max {
            tracing::debug!(metric = %self.id, raw_max, mean, "timer max raced with reset, using mean");
        }

        TimerStats {
            id: self.id.clone(),
            bucket_range: self.bucket_range.clone(),
            count,
            total_nanos: total,
            max_nanos: max,
            mean_nanos: mean,
            window_start_millis: window_start,
            window_end_millis: now,
        }
    }
}

impl Metric for Timer {
    fn id(&self) -> &MetricId {
        &self.id
    }

    fn collect(&self, mode: Collect, out: &mut Vec<MetricStats>) {
        let stats = self.take();
        if mode == Collect::NonEmpty && stats.count == 0 {
            return;
        }
        out.push(MetricStats::Timer(stats));
    }

    fn reset(&self) {
        let _ = self.take();
    }
}

/// Success/error pair of timers. The error timer's identity carries the
/// `.error` suffix so both report as independent metrics.
#[derive(Debug)]
pub struct TimedMetric {
    success: Timer,
    error: Timer,
}

impl TimedMetric {
    pub fn new(id: MetricId) -> Self {
        Self::with_bucket_range(id, None)
    }

    pub(crate) fn with_bucket_range(id: MetricId, bucket_range: Option<Box<str>>) -> Self {
        let error_id = id.with_suffix(ERROR_SUFFIX);
        Self {
            success: Timer::with_bucket_range(id, bucket_range.clone()),
            error: Timer::with_bucket_range(error_id, bucket_range),
        }
    }

    /// Route one event by outcome.
    pub fn add(&self, success: bool, nanos: u64) {
        if success {
            self.success.record(nanos);
        } else {
            self.error.record(nanos);
        }
    }

    pub fn add_success(&self, nanos: u64) {
        self.success.record(nanos);
    }

    pub fn add_error(&self, nanos: u64) {
        self.error.record(nanos);
    }

    /// Record the time elapsed since `start`.
    pub fn add_since(&self, start: Instant, success: bool) {
        self.add(success, duration_nanos(start.elapsed()));
    }

    /// Time a closure returning `Result`; `Err` counts as an error outcome.
    pub fn time<T, E>(&self, f: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E> {
        let start = Instant::now();
        let res = f();
        self.add_since(start, res.is_ok());
        res
    }

    pub fn success(&self) -> &Timer {
        &self.success
    }

    pub fn error(&self) -> &Timer {
        &self.error
    }
}

impl Metric for TimedMetric {
    fn id(&self) -> &MetricId {
        self.success.id()
    }

    fn collect(&self, mode: Collect, out: &mut Vec<MetricStats>) {
        self.success.collect(mode, out);
        self.error.collect(mode, out);
    }

    fn reset(&self) {
        self.success.reset();
        self.error.reset();
    }
}

/// Max reported for a window: a raw max below the mean of a non-empty window
/// was reset by a concurrent collect and is replaced by the mean.
fn sanitized_max(raw_max: u64, mean: u64, count: u64) -> u64 {
    if count > 0 && raw_max < mean {
        mean
    } else {
        raw_max
    }
}

pub(crate) fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

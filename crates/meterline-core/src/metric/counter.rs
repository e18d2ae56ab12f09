use std::sync::atomic::{AtomicU64, Ordering};

use super::{Collect, CounterStats, Metric, MetricStats};
use crate::id::MetricId;

/// Monotonic event counter, reset on every collect.
#[derive(Debug)]
pub struct Counter {
    id: MetricId,
    count: AtomicU64,
}

impl Counter {
    pub fn new(id: MetricId) -> Self {
        Self {
            id,
            count: AtomicU64::new(0),
        }
    }

    /// Increment by 1.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, by: u64) {
        self.count.fetch_add(by, Ordering::Relaxed);
    }

    /// Current window value without resetting.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Atomically take the window value and start a new window at zero.
    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

impl Metric for Counter {
    fn id(&self) -> &MetricId {
        &self.id
    }

    fn collect(&self, mode: Collect, out: &mut Vec<MetricStats>) {
        let count = self.take();
        if count == 0 && mode == Collect::NonEmpty {
            return;
        }
        out.push(MetricStats::Counter(CounterStats {
            id: self.id.clone(),
            count,
        }));
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }
}

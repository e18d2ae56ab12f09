//! Thread-safe metric registry.
//!
//! One `DashMap` per metric kind keyed by `MetricId`. Lookups of existing
//! metrics take a shard read lock only; creation goes through the entry API
//! so racing callers always end up with one published instance.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;

use crate::error::Result;
use crate::id::MetricId;
use crate::matcher::NameFilter;
use crate::metric::{
    BucketTimer, Collect, Counter, GaugeDouble, GaugeLong, Metric, MetricStats, TimedMetric,
};
use crate::timing::RequestTiming;

/// Default number of completed request timings held between report cycles.
pub const DEFAULT_TIMING_CAPACITY: usize = 1_000;

/// Source of pre-computed statistics merged into each report cycle.
pub trait MetricSupplier: Send + Sync {
    fn supply(&self) -> Vec<MetricStats>;
}

impl<F> MetricSupplier for F
where
    F: Fn() -> Vec<MetricStats> + Send + Sync,
{
    fn supply(&self) -> Vec<MetricStats> {
        self()
    }
}

pub struct MetricRegistry {
    counters: DashMap<MetricId, Arc<Counter>>,
    timers: DashMap<MetricId, Arc<TimedMetric>>,
    bucket_timers: DashMap<MetricId, Arc<BucketTimer>>,
    gauges: DashMap<MetricId, Arc<dyn Metric>>,
    suppliers: RwLock<Vec<Arc<dyn MetricSupplier>>>,
    timings: Mutex<VecDeque<RequestTiming>>,
    timing_capacity: usize,
    timings_dropped: AtomicU64,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::with_timing_capacity(DEFAULT_TIMING_CAPACITY)
    }

    pub fn with_timing_capacity(timing_capacity: usize) -> Self {
        Self {
            counters: DashMap::new(),
            timers: DashMap::new(),
            bucket_timers: DashMap::new(),
            gauges: DashMap::new(),
            suppliers: RwLock::new(Vec::new()),
            timings: Mutex::new(VecDeque::new()),
            timing_capacity,
            timings_dropped: AtomicU64::new(0),
        }
    }

    /// Counter for `id`, created on first use.
    pub fn counter(&self, id: impl Into<MetricId>) -> Arc<Counter> {
        get_or_create(&self.counters, id.into(), Counter::new)
    }

    /// Success/error timer pair for `id`, created on first use.
    pub fn timer(&self, id: impl Into<MetricId>) -> Arc<TimedMetric> {
        get_or_create(&self.timers, id.into(), TimedMetric::new)
    }

    /// Bucket timer for `id`. Boundaries only apply on first creation; an
    /// existing timer is returned as-is.
    pub fn bucket_timer(&self, id: impl Into<MetricId>, bounds_millis: &[u64]) -> Result<Arc<BucketTimer>> {
        let id = id.into();
        if let Some(existing) = self.bucket_timers.get(&id) {
            return Ok(Arc::clone(existing.value()));
        }
        // validate before taking the shard write lock
        let candidate = BucketTimer::new(id.clone(), bounds_millis)?;
        let entry = self
            .bucket_timers
            .entry(id)
            .or_insert_with(|| Arc::new(candidate));
        Ok(Arc::clone(entry.value()))
    }

    /// Register a floating-point gauge. Re-registering an identity replaces it.
    pub fn register_gauge_double(
        &self,
        id: impl Into<MetricId>,
        supplier: impl Fn() -> f64 + Send + Sync + 'static,
    ) {
        let id = id.into();
        let gauge: Arc<dyn Metric> = Arc::new(GaugeDouble::new(id.clone(), supplier));
        if self.gauges.insert(id.clone(), gauge).is_some() {
            tracing::debug!(metric = %id, "gauge replaced");
        }
    }

    /// Register an integer gauge. Re-registering an identity replaces it.
    pub fn register_gauge_long(
        &self,
        id: impl Into<MetricId>,
        supplier: impl Fn() -> i64 + Send + Sync + 'static,
    ) {
        let id = id.into();
        let gauge: Arc<dyn Metric> = Arc::new(GaugeLong::new(id.clone(), supplier));
        if self.gauges.insert(id.clone(), gauge).is_some() {
            tracing::debug!(metric = %id, "gauge replaced");
        }
    }

    pub fn add_supplier(&self, supplier: Arc<dyn MetricSupplier>) {
        if let Ok(mut g) = self.suppliers.write() {
            g.push(supplier);
        }
    }

    /// Number of registered live metrics (gauges included, suppliers not).
    pub fn len(&self) -> usize {
        self.counters.len() + self.timers.len() + self.bucket_timers.len() + self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot-and-reset every metric, including empty windows.
    pub fn collect_all(&self) -> Vec<MetricStats> {
        self.collect_with(Collect::All, None)
    }

    /// Snapshot-and-reset every metric, dropping empty windows, plus supplier batches.
    pub fn collect_non_empty(&self) -> Vec<MetricStats> {
        self.collect_with(Collect::NonEmpty, None)
    }

    /// Like `collect_non_empty`, restricted to names accepted by `filter`.
    /// Metrics that do not match are left untouched.
    pub fn collect_matching(&self, filter: &dyn NameFilter) -> Vec<MetricStats> {
        self.collect_with(Collect::NonEmpty, Some(filter))
    }

    fn collect_with(&self, mode: Collect, filter: Option<&dyn NameFilter>) -> Vec<MetricStats> {
        // Point-in-time view: clone the handles first so no shard lock is held
        // while collecting (gauge suppliers may be slow).
        let mut live: Vec<Arc<dyn Metric>> = Vec::with_capacity(self.len());
        snapshot_into(&self.counters, &mut live);
        snapshot_into(&self.timers, &mut live);
        snapshot_into(&self.bucket_timers, &mut live);
        for r in self.gauges.iter() {
            live.push(Arc::clone(r.value()));
        }

        let mut out = Vec::with_capacity(live.len());
        for metric in &live {
            if filter.is_some_and(|f| !f.accepts(metric.id().name())) {
                continue;
            }
            metric.collect(mode, &mut out);
        }

        for stats in self.supply() {
            if filter.is_some_and(|f| !f.accepts(stats.id().name())) {
                continue;
            }
            out.push(stats);
        }
        // stable: bucket windows sharing an identity keep ascending order
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    fn supply(&self) -> Vec<MetricStats> {
        let suppliers: Vec<Arc<dyn MetricSupplier>> = match self.suppliers.read() {
            Ok(g) => g.clone(),
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::new();
        for s in suppliers {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| s.supply())) {
                Ok(batch) => out.extend(batch),
                Err(_) => tracing::error!("metric supplier panicked; batch skipped"),
            }
        }
        out
    }

    /// Queue one completed request timing for the next report cycle.
    /// When the queue is full the oldest timing is dropped.
    pub fn report_request_timing(&self, timing: RequestTiming) {
        if self.timing_capacity == 0 {
            self.timings_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        // Poisoned mutex means logic bug; drop the timing instead of panicking.
        let Ok(mut q) = self.timings.lock() else {
            self.timings_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if q.len() >= self.timing_capacity {
            q.pop_front();
            self.timings_dropped.fetch_add(1, Ordering::Relaxed);
        }
        q.push_back(timing);
    }

    /// Take every queued request timing.
    pub fn drain_request_timings(&self) -> Vec<RequestTiming> {
        match self.timings.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Total request timings discarded because the queue was full.
    pub fn request_timings_dropped(&self) -> u64 {
        self.timings_dropped.load(Ordering::Relaxed)
    }
}

fn get_or_create<M>(map: &DashMap<MetricId, Arc<M>>, id: MetricId, factory: impl FnOnce(MetricId) -> M) -> Arc<M> {
    if let Some(existing) = map.get(&id) {
        return Arc::clone(existing.value());
    }
    let entry = map.entry(id.clone()).or_insert_with(|| Arc::new(factory(id)));
    Arc::clone(entry.value())
}

fn snapshot_into<K, M>(map: &DashMap<K, Arc<M>>, out: &mut Vec<Arc<dyn Metric>>)
where
    K: Eq + Hash,
    M: Metric + 'static,
{
    for r in map.iter() {
        let m: Arc<dyn Metric> = Arc::clone(r.value()) as Arc<dyn Metric>;
        out.push(m);
    }
}

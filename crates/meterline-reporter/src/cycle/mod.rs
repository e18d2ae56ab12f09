//! One collection/reporting pass: snapshot, build timing trees, fan out to sinks.

use std::sync::Arc;
use std::time::Instant;

use meterline_core::{LikeMatcherSet, MetricRegistry, MetricStats, TimingTree};

use crate::obs::ReporterMetrics;
use crate::sinks::MetricSink;

/// Everything collected in one cycle.
#[derive(Debug, Clone)]
pub struct ReportBatch {
    pub collected_at_millis: u64,
    pub stats: Vec<MetricStats>,
    pub timings: Vec<TimingTree>,
    /// Spans below this share of their request are left out when rendering.
    pub timing_threshold_percent: f64,
}

impl ReportBatch {
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.timings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub stats: usize,
    pub timings: usize,
    pub sinks_ok: usize,
    pub sinks_failed: usize,
}

pub struct ReportCycle {
    registry: Arc<MetricRegistry>,
    sinks: Vec<Arc<dyn MetricSink>>,
    include: LikeMatcherSet,
    timing_threshold_percent: f64,
    metrics: ReporterMetrics,
}

impl ReportCycle {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        let metrics = ReporterMetrics::new(Arc::clone(&registry));
        Self {
            registry,
            sinks: Vec::new(),
            include: LikeMatcherSet::default(),
            timing_threshold_percent: 0.0,
            metrics,
        }
    }

    /// Restrict collection to names matching any of `patterns`.
    pub fn with_include(mut self, patterns: &[String]) -> Self {
        self.include = LikeMatcherSet::new(patterns);
        self
    }

    pub fn with_timing_threshold(mut self, percent: f64) -> Self {
        self.timing_threshold_percent = percent;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Snapshot-and-reset the registry without sending anything.
    pub fn collect(&self) -> ReportBatch {
        let collected_at_millis = now_millis();
        let stats = if self.include.is_empty() {
            self.registry.collect_non_empty()
        } else {
            self.registry.collect_matching(&self.include)
        };
        let timings = self
            .registry
            .drain_request_timings()
            .iter()
            .map(TimingTree::build)
            .filter(|t| !t.is_empty())
            .collect();

        ReportBatch {
            collected_at_millis,
            stats,
            timings,
            timing_threshold_percent: self.timing_threshold_percent,
        }
    }

    /// Collect once and hand the batch to every sink.
    pub fn run_once(&self) -> CycleOutcome {
        let started = Instant::now();
        let batch = self.collect();
        let mut outcome = CycleOutcome {
            stats: batch.stats.len(),
            timings: batch.timings.len(),
            ..CycleOutcome::default()
        };

        for sink in &self.sinks {
            match sink.report(&batch) {
                Ok(()) => outcome.sinks_ok += 1,
                Err(e) => {
                    outcome.sinks_failed += 1;
                    self.metrics.sink_failed(sink.name());
                    tracing::warn!(
                        sink = sink.name(),
                        kind = e.kind().as_str(),
                        error = %e,
                        "sink failed; cycle continues"
                    );
                }
            }
        }

        self.metrics.cycle_finished(started, outcome.sinks_failed == 0);
        tracing::debug!(
            stats = outcome.stats,
            timings = outcome.timings,
            failed = outcome.sinks_failed,
            "report cycle done"
        );
        outcome
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().try_into().unwrap_or(0)
}

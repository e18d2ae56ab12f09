//! Reporter self-metrics.
//!
//! Recorded into the same registry the application uses, so they ship with
//! the next cycle like any other metric.

use std::sync::Arc;
use std::time::Instant;

use meterline_core::{Counter, MetricId, MetricRegistry, TimedMetric};

pub const CYCLES: &str = "meterline.report.cycles";
pub const SINK_ERRORS: &str = "meterline.report.sink_errors";
pub const DURATION: &str = "meterline.report.duration";
pub const TIMINGS_DROPPED: &str = "meterline.request_timing.dropped";

#[derive(Clone)]
pub struct ReporterMetrics {
    registry: Arc<MetricRegistry>,
    cycles: Arc<Counter>,
    duration: Arc<TimedMetric>,
}

impl ReporterMetrics {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        let cycles = registry.counter(CYCLES);
        let duration = registry.timer(DURATION);

        // weak: the gauge lives inside the registry it reads
        let weak = Arc::downgrade(&registry);
        registry.register_gauge_long(TIMINGS_DROPPED, move || {
            weak.upgrade()
                .map(|r| i64::try_from(r.request_timings_dropped()).unwrap_or(i64::MAX))
                .unwrap_or(0)
        });

        Self {
            registry,
            cycles,
            duration,
        }
    }

    pub fn cycle_finished(&self, started: Instant, clean: bool) {
        self.cycles.increment();
        self.duration.add_since(started, clean);
    }

    pub fn sink_failed(&self, sink: &str) {
        self.registry
            .counter(MetricId::with_tag_pairs(SINK_ERRORS, &[("sink", sink)]))
            .increment();
    }
}

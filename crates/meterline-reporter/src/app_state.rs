//! Explicit wiring of registry, sinks, report cycle and scheduler.
//!
//! Built once at startup from `ReporterConfig`. Startup problems (bad
//! directory, unresolvable statsd host) are returned, not logged and skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meterline_core::error::Result;
use meterline_core::MetricRegistry;

use crate::config::ReporterConfig;
use crate::cycle::{CycleOutcome, ReportCycle};
use crate::schedule::{ScheduledTask, TaskState};
use crate::sinks::{JsonBuffer, JsonSink, MetricSink, RotatingFileSink, StatsdSink};

/// How long shutdown waits for an in-flight cycle before flushing anyway.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ReporterConfig,
    registry: Arc<MetricRegistry>,
    cycle: Arc<ReportCycle>,
    task: ScheduledTask,
    json: Option<Arc<JsonBuffer>>,
    draining: AtomicBool,
}

impl AppState {
    pub fn new(cfg: ReporterConfig) -> Result<Self> {
        let registry = Arc::new(MetricRegistry::with_timing_capacity(cfg.request_timing.capacity));
        Self::with_parts(cfg, registry, Vec::new())
    }

    /// Wire around an existing registry, adding `extra_sinks` after the configured ones.
    pub fn with_parts(
        cfg: ReporterConfig,
        registry: Arc<MetricRegistry>,
        extra_sinks: Vec<Arc<dyn MetricSink>>,
    ) -> Result<Self> {
        cfg.validate()?;

        let mut cycle = ReportCycle::new(Arc::clone(&registry))
            .with_include(&cfg.report.include)
            .with_timing_threshold(cfg.request_timing.threshold_percent);

        if cfg.file.enabled {
            cycle = cycle.with_sink(Arc::new(RotatingFileSink::new(&cfg.file)?));
        }
        if cfg.statsd.enabled {
            let sink = StatsdSink::new(&cfg.statsd)?;
            tracing::info!(target_addr = %sink.target(), "statsd sink connected");
            cycle = cycle.with_sink(Arc::new(sink));
        }
        let json = if cfg.json.enabled {
            let buffer = Arc::new(JsonBuffer::new(cfg.json.history));
            cycle = cycle.with_sink(Arc::new(JsonSink::new(Arc::clone(&buffer))));
            Some(buffer)
        } else {
            None
        };
        for sink in extra_sinks {
            cycle = cycle.with_sink(sink);
        }

        let cycle = Arc::new(cycle);
        if cycle.sink_names().is_empty() {
            tracing::warn!("no sinks enabled; metrics will be collected and discarded");
        }

        let task = {
            let cycle = Arc::clone(&cycle);
            ScheduledTask::new(
                "meterline-report",
                cfg.report.interval(),
                cfg.report.initial_delay(),
                move || {
                    cycle.run_once();
                },
            )?
        };

        tracing::info!(
            sinks = ?cycle.sink_names(),
            frequency_secs = cfg.report.frequency_secs,
            "reporter wired"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                cycle,
                task,
                json,
                draining: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.inner.registry
    }

    pub fn cycle(&self) -> &Arc<ReportCycle> {
        &self.inner.cycle
    }

    pub fn json_buffer(&self) -> Option<&Arc<JsonBuffer>> {
        self.inner.json.as_ref()
    }

    pub fn task_state(&self) -> TaskState {
        self.inner.task.state()
    }

    /// Start periodic reporting.
    pub fn start(&self) -> Result<()> {
        self.inner.task.start()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Stop the schedule and flush one final cycle. Blocks.
    pub fn shutdown(&self) -> Option<CycleOutcome> {
        if self.inner.draining.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.inner.task.cancel(false);
        if !self.inner.task.wait_if_running(SHUTDOWN_WAIT) {
            tracing::warn!("report cycle still running at shutdown; flushing anyway");
        }
        let outcome = self.inner.cycle.run_once();
        tracing::info!(
            stats = outcome.stats,
            failed = outcome.sinks_failed,
            "final report cycle flushed"
        );
        Some(outcome)
    }
}

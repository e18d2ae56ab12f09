//! meterline core: metric identities, concurrent primitives, the registry,
//! request timing reconstruction, and wire encoders.
//!
//! This crate carries no runtime, network, or filesystem dependencies so the
//! recording side can be linked into any application. Scheduling and sinks
//! live in `meterline-reporter`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Recording operations never fail; only construction with bad arguments
//! surfaces as `MeterError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod id;
pub mod matcher;
pub mod metric;
pub mod registry;
pub mod timing;
pub mod wire;

/// Shared result type.
pub use error::{MeterError, Result};
pub use id::MetricId;
pub use matcher::{LikeMatcher, LikeMatcherSet, NameFilter};
pub use metric::{
    BucketTimer, Counter, CounterStats, GaugeDouble, GaugeDoubleStats, GaugeLong,
    GaugeLongStats, Metric, MetricStats, TimedMetric, Timer, TimerStats,
};
pub use registry::{MetricRegistry, MetricSupplier};
pub use timing::{RequestTiming, RequestTimingRecorder, SpanHandle, TimingEntry, TimingNode, TimingTree};

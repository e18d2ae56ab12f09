//! Report destinations.
//!
//! Sinks run on the reporting thread only and may block. A sink error affects
//! that sink for that cycle; the cycle moves on to the next sink.

pub mod file;
pub mod json;
pub mod statsd;

use meterline_core::error::Result;

use crate::cycle::ReportBatch;

pub use file::RotatingFileSink;
pub use json::{JsonBuffer, JsonSink};
pub use statsd::StatsdSink;

pub trait MetricSink: Send + Sync {
    /// Stable label for logs and the sink error counter.
    fn name(&self) -> &str;

    fn report(&self, batch: &ReportBatch) -> Result<()>;
}

//! Wire encoders (statsd lines, JSON, CSV).
//!
//! Encoders take `MetricStats` batches and `TimingTree`s and never touch
//! live metrics. Sinks decide where the encoded bytes go.

pub mod csv;
pub mod json;
pub mod statsd;
pub mod trim;

pub use trim::trim_name;

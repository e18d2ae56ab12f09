//! meterline reporter library entry.
//!
//! Wires the core registry to a scheduled report cycle and its sinks
//! (rotating CSV files, statsd over UDP, in-memory JSON), plus the ops HTTP
//! endpoints. Used by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod cycle;
pub mod obs;
pub mod ops;
pub mod router;
pub mod schedule;
pub mod sinks;

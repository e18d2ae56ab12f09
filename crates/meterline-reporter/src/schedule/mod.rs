//! Recurring task executor that drives report cycles.

pub mod task;

pub use task::{ScheduledTask, TaskState};

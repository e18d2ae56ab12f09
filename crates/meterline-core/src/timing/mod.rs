//! Request timing: per-request span recording and call-tree reconstruction.

mod entry;
mod tree;

pub use entry::{RequestTiming, RequestTimingRecorder, SpanHandle, TimingEntry};
pub use tree::{TimingLine, TimingNode, TimingTree};

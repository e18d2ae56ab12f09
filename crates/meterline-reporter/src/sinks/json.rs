//! In-memory JSON history, read by the ops endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use meterline_core::error::{MeterError, Result};
use meterline_core::wire::json;

use super::MetricSink;
use crate::cycle::ReportBatch;

/// One encoded cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCycle {
    pub collected_at_millis: u64,
    /// `[{..},..]` of metric statistics.
    pub metrics: String,
    /// `[{..},..]` of request timing trees.
    pub requests: String,
}

/// Bounded history shared between the sink and readers.
pub struct JsonBuffer {
    capacity: usize,
    cycles: RwLock<VecDeque<Arc<JsonCycle>>>,
}

impl JsonBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cycles: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, cycle: JsonCycle) -> Result<()> {
        let mut q = self
            .cycles
            .write()
            .map_err(|_| MeterError::InvalidState("json buffer lock poisoned"))?;
        while q.len() >= self.capacity {
            q.pop_front();
        }
        q.push_back(Arc::new(cycle));
        Ok(())
    }

    pub fn latest(&self) -> Option<Arc<JsonCycle>> {
        self.cycles.read().ok()?.back().cloned()
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<Arc<JsonCycle>> {
        match self.cycles.read() {
            Ok(q) => q.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cycles.read().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct JsonSink {
    buffer: Arc<JsonBuffer>,
}

impl JsonSink {
    pub fn new(buffer: Arc<JsonBuffer>) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &Arc<JsonBuffer> {
        &self.buffer
    }
}

impl MetricSink for JsonSink {
    fn name(&self) -> &str {
        "json"
    }

    fn report(&self, batch: &ReportBatch) -> Result<()> {
        let mut metrics = String::new();
        json::write_array(&batch.stats, &mut metrics)?;

        let trees: Vec<serde_json::Value> = batch.timings.iter().map(json::timing_to_value).collect();
        let requests = serde_json::to_string(&trees)?;

        self.buffer.push(JsonCycle {
            collected_at_millis: batch.collected_at_millis,
            metrics,
            requests,
        })
    }
}

use std::time::Instant;

use crate::id::MetricId;
use crate::metric::now_epoch_millis;

/// One span inside a request. Times are nanoseconds from the request origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingEntry {
    /// Sequence number assigned when the span started.
    pub order: u32,
    /// Number of spans open when this one started.
    pub depth: u32,
    pub id: MetricId,
    pub start_nanos: u64,
    /// `None` if the span never completed.
    pub end_nanos: Option<u64>,
}

impl TimingEntry {
    pub fn new(order: u32, depth: u32, id: MetricId, start_nanos: u64, end_nanos: Option<u64>) -> Self {
        Self {
            order,
            depth,
            id,
            start_nanos,
            end_nanos,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.end_nanos.is_some()
    }

    pub fn duration_nanos(&self) -> Option<u64> {
        self.end_nanos.map(|end| end.saturating_sub(self.start_nanos))
    }
}

/// All spans of one logical request, in start order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTiming {
    pub entries: Vec<TimingEntry>,
    pub start_epoch_millis: u64,
}

impl RequestTiming {
    pub fn new(entries: Vec<TimingEntry>, start_epoch_millis: u64) -> Self {
        Self {
            entries,
            start_epoch_millis,
        }
    }
}

/// Handle returned by [`RequestTimingRecorder::start_span`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanHandle(usize);

/// Recording side for one request. Owned by the code handling the request,
/// so it needs no synchronization.
#[derive(Debug)]
pub struct RequestTimingRecorder {
    origin: Instant,
    start_epoch_millis: u64,
    entries: Vec<TimingEntry>,
    open: u32,
}

impl Default for RequestTimingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTimingRecorder {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            start_epoch_millis: now_epoch_millis(),
            entries: Vec::new(),
            open: 0,
        }
    }

    pub fn start_span(&mut self, id: MetricId) -> SpanHandle {
        let now = self.elapsed_nanos();
        self.start_span_at(id, now)
    }

    pub fn end_span(&mut self, span: SpanHandle) {
        let now = self.elapsed_nanos();
        self.end_span_at(span, now);
    }

    /// Start a span at an explicit offset from the request origin.
    pub fn start_span_at(&mut self, id: MetricId, start_nanos: u64) -> SpanHandle {
        let order = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries
            .push(TimingEntry::new(order, self.open, id, start_nanos, None));
        self.open = self.open.saturating_add(1);
        SpanHandle(self.entries.len() - 1)
    }

    /// End a span at an explicit offset. Ending a span twice keeps the first end.
    pub fn end_span_at(&mut self, span: SpanHandle, end_nanos: u64) {
        let Some(entry) = self.entries.get_mut(span.0) else {
            return;
        };
        if entry.end_nanos.is_some() {
            return;
        }
        entry.end_nanos = Some(end_nanos.max(entry.start_nanos));
        self.open = self.open.saturating_sub(1);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close recording. Spans never ended stay incomplete.
    pub fn finish(self) -> RequestTiming {
        RequestTiming::new(self.entries, self.start_epoch_millis)
    }

    fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_assigns_order_and_depth() {
        let mut rec = RequestTimingRecorder::new();
        let a = rec.start_span_at(MetricId::new("a"), 0);
        let b = rec.start_span_at(MetricId::new("b"), 10);
        rec.end_span_at(b, 20);
        let c = rec.start_span_at(MetricId::new("c"), 30);
        rec.end_span_at(c, 40);
        rec.end_span_at(a, 50);
        rec.start_span_at(MetricId::new("d"), 60);

        let t = rec.finish();
        let summary: Vec<(u32, u32, Option<u64>)> = t
            .entries
            .iter()
            .map(|e| (e.order, e.depth, e.duration_nanos()))
            .collect();
        assert_eq!(
            summary,
            vec![(0, 0, Some(50)), (1, 1, Some(10)), (2, 1, Some(10)), (3, 0, None)]
        );
    }

    #[test]
    fn double_end_keeps_first() {
        let mut rec = RequestTimingRecorder::new();
        let a = rec.start_span_at(MetricId::new("a"), 5);
        rec.end_span_at(a, 9);
        rec.end_span_at(a, 99);
        assert_eq!(rec.finish().entries[0].end_nanos, Some(9));
    }
}

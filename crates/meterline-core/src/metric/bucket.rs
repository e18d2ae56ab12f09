//! Timer split into duration buckets.
//!
//! Boundaries `[b0, .., bn]` (milliseconds, strictly ascending) define n+1
//! half-open ranges `[0,b0) [b0,b1) .. [bn,inf)`. A duration of exactly `bi`
//! lands in the bucket that starts at `bi`.

use std::time::Instant;

use super::timer::duration_nanos;
use super::{Collect, Metric, MetricStats, TimedMetric};
use crate::error::{MeterError, Result};
use crate::id::MetricId;

#[derive(Debug)]
pub struct BucketTimer {
    id: MetricId,
    bounds_millis: Box<[u64]>,
    buckets: Box<[TimedMetric]>,
}

impl BucketTimer {
    /// Fails if `bounds_millis` is empty or not strictly ascending.
    pub fn new(id: MetricId, bounds_millis: &[u64]) -> Result<Self> {
        if bounds_millis.is_empty() {
            return Err(MeterError::Config(format!(
                "bucket timer {id}: at least one boundary required"
            )));
        }
        if bounds_millis.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MeterError::Config(format!(
                "bucket timer {id}: boundaries must be strictly ascending: {bounds_millis:?}"
            )));
        }

        let mut buckets = Vec::with_capacity(bounds_millis.len() + 1);
        let mut lower = 0u64;
        for &upper in bounds_millis {
            let range = format!("{lower}-{upper}");
            buckets.push(TimedMetric::with_bucket_range(id.clone(), Some(range.into())));
            lower = upper;
        }
        let range = format!("{lower}+");
        buckets.push(TimedMetric::with_bucket_range(id.clone(), Some(range.into())));

        Ok(Self {
            id,
            bounds_millis: bounds_millis.into(),
            buckets: buckets.into(),
        })
    }

    pub fn bounds_millis(&self) -> &[u64] {
        &self.bounds_millis
    }

    /// Index of the bucket a duration is routed to.
    pub fn bucket_index(&self, nanos: u64) -> usize {
        let millis = nanos / 1_000_000;
        self.bounds_millis.partition_point(|&b| b <= millis)
    }

    pub fn buckets(&self) -> &[TimedMetric] {
        &self.buckets
    }

    pub fn add(&self, success: bool, nanos: u64) {
        let idx = self.bucket_index(nanos);
        if let Some(bucket) = self.buckets.get(idx) {
            bucket.add(success, nanos);
        }
    }

    pub fn add_since(&self, start: Instant, success: bool) {
        self.add(success, duration_nanos(start.elapsed()));
    }
}

impl Metric for BucketTimer {
    fn id(&self) -> &MetricId {
        &self.id
    }

    fn collect(&self, mode: Collect, out: &mut Vec<MetricStats>) {
        for bucket in self.buckets.iter() {
            bucket.collect(mode, out);
        }
    }

    fn reset(&self) {
        for bucket in self.buckets.iter() {
            bucket.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const MS: u64 = 1_000_000;

    fn timer() -> BucketTimer {
        BucketTimer::new(MetricId::new("req"), &[100, 200, 300]).unwrap()
    }

    #[test]
    fn ranges_are_labelled() {
        let t = timer();
        let labels: Vec<_> = t
            .buckets()
            .iter()
            .map(|b| b.success().bucket_range().unwrap_or_default().to_string())
            .collect();
        assert_eq!(labels, ["0-100", "100-200", "200-300", "300+"]);
    }

    #[test]
    fn boundary_value_goes_to_upper_bucket() {
        let t = timer();
        assert_eq!(t.bucket_index(0), 0);
        assert_eq!(t.bucket_index(99 * MS + 999_999), 0);
        assert_eq!(t.bucket_index(100 * MS), 1);
        assert_eq!(t.bucket_index(200 * MS), 2);
        assert_eq!(t.bucket_index(299 * MS), 2);
        assert_eq!(t.bucket_index(300 * MS), 3);
        assert_eq!(t.bucket_index(u64::MAX), 3);
    }

    #[test]
    fn rejects_bad_boundaries() {
        assert!(BucketTimer::new(MetricId::new("x"), &[]).is_err());
        assert!(BucketTimer::new(MetricId::new("x"), &[100, 100]).is_err());
        assert!(BucketTimer::new(MetricId::new("x"), &[200, 100]).is_err());
    }

    #[test]
    fn collect_emits_only_used_buckets() {
        let t = timer();
        t.add(true, 150 * MS);
        t.add(true, 250 * MS);
        t.add(false, 250 * MS);

        let mut out = Vec::new();
        t.collect(Collect::NonEmpty, &mut out);
        let ranges: Vec<(String, u64)> = out
            .iter()
            .filter_map(|s| match s {
                MetricStats::Timer(t) => Some((
                    format!("{}:{}", t.id.name(), t.bucket_range.as_deref().unwrap_or("")),
                    t.count,
                )),
                _ => None,
            })
            .collect();
        assert_eq!(
            ranges,
            vec![
                ("req:100-200".to_string(), 1),
                ("req:200-300".to_string(), 1),
                ("req.error:200-300".to_string(), 1),
            ]
        );
    }
}

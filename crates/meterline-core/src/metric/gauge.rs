//! Supplier-backed gauges.
//!
//! A gauge has no window; each collect invokes the supplier once. A supplier
//! that panics loses only its own value for that cycle.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::{Collect, GaugeDoubleStats, GaugeLongStats, Metric, MetricStats};
use crate::id::MetricId;

type DoubleSupplier = Box<dyn Fn() -> f64 + Send + Sync>;
type LongSupplier = Box<dyn Fn() -> i64 + Send + Sync>;

pub struct GaugeDouble {
    id: MetricId,
    supplier: DoubleSupplier,
}

impl GaugeDouble {
    pub fn new(id: MetricId, supplier: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            id,
            supplier: Box::new(supplier),
        }
    }

    /// Invoke the supplier. `None` if it panicked or returned a non-finite value.
    pub fn value(&self) -> Option<f64> {
        match catch_unwind(AssertUnwindSafe(|| (self.supplier)())) {
            Ok(v) if v.is_finite() => Some(v),
            Ok(v) => {
                tracing::warn!(metric = %self.id, value = %v, "gauge supplier returned non-finite value");
                None
            }
            Err(_) => {
                tracing::error!(metric = %self.id, "gauge supplier panicked");
                None
            }
        }
    }
}

impl Metric for GaugeDouble {
    fn id(&self) -> &MetricId {
        &self.id
    }

    fn collect(&self, _mode: Collect, out: &mut Vec<MetricStats>) {
        if let Some(value) = self.value() {
            out.push(MetricStats::GaugeDouble(GaugeDoubleStats {
                id: self.id.clone(),
                value,
            }));
        }
    }

    fn reset(&self) {}
}

pub struct GaugeLong {
    id: MetricId,
    supplier: LongSupplier,
}

impl GaugeLong {
    pub fn new(id: MetricId, supplier: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            id,
            supplier: Box::new(supplier),
        }
    }

    /// Invoke the supplier. `None` if it panicked.
    pub fn value(&self) -> Option<i64> {
        match catch_unwind(AssertUnwindSafe(|| (self.supplier)())) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::error!(metric = %self.id, "gauge supplier panicked");
                None
            }
        }
    }
}

impl Metric for GaugeLong {
    fn id(&self) -> &MetricId {
        &self.id
    }

    fn collect(&self, _mode: Collect, out: &mut Vec<MetricStats>) {
        if let Some(value) = self.value() {
            out.push(MetricStats::GaugeLong(GaugeLongStats {
                id: self.id.clone(),
                value,
            }));
        }
    }

    fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    #[test]
    fn long_gauge_reports_current_value_each_collect() {
        let src = Arc::new(AtomicI64::new(5));
        let g = {
            let src = Arc::clone(&src);
            GaugeLong::new(MetricId::new("queue.depth"), move || src.load(Ordering::Relaxed))
        };

        let mut out = Vec::new();
        g.collect(Collect::NonEmpty, &mut out);
        src.store(9, Ordering::Relaxed);
        g.collect(Collect::NonEmpty, &mut out);

        let values: Vec<i64> = out
            .iter()
            .filter_map(|s| match s {
                MetricStats::GaugeLong(g) => Some(g.value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![5, 9]);
    }

    #[test]
    fn panicking_supplier_is_skipped() {
        let g = GaugeDouble::new(MetricId::new("bad"), || panic!("boom"));
        let mut out = Vec::new();
        g.collect(Collect::All, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn nan_is_not_reported() {
        let g = GaugeDouble::new(MetricId::new("nan"), || f64::NAN);
        assert_eq!(g.value(), None);
    }
}

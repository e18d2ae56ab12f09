//! JSON encoding of statistics and request timing trees.
//!
//! Timer durations are emitted in microseconds. `write_objects` emits bare
//! comma-separated objects so a streaming caller decides where the
//! surrounding brackets go; `write_array` wraps one batch in `[...]`.

use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::id::MetricId;
use crate::metric::MetricStats;
use crate::timing::{TimingNode, TimingTree};

pub fn stats_to_value(stats: &MetricStats) -> Value {
    let mut v = match stats {
        MetricStats::Counter(c) => json!({
            "type": "counter",
            "name": c.id.name(),
            "count": c.count,
        }),
        MetricStats::GaugeDouble(g) => json!({
            "type": "gauge",
            "name": g.id.name(),
            "value": g.value,
        }),
        MetricStats::GaugeLong(g) => json!({
            "type": "gauge",
            "name": g.id.name(),
            "value": g.value,
        }),
        MetricStats::Timer(t) => {
            let mut v = json!({
                "type": "timer",
                "name": t.id.name(),
                "count": t.count,
                "total": t.total_micros(),
                "mean": t.mean_micros(),
                "max": t.max_micros(),
                "start": t.window_start_millis,
                "end": t.window_end_millis,
            });
            if let (Some(range), Some(obj)) = (t.bucket_range.as_deref(), v.as_object_mut()) {
                obj.insert("bucket".into(), Value::from(range));
            }
            v
        }
    };
    if let (Some(tags), Some(obj)) = (tags_value(stats.id()), v.as_object_mut()) {
        obj.insert("tags".into(), tags);
    }
    v
}

fn tags_value(id: &MetricId) -> Option<Value> {
    if !id.has_tags() {
        return None;
    }
    let map: Map<String, Value> = id
        .tags()
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(&**v)))
        .collect();
    Some(Value::Object(map))
}

/// `{..},{..}` without brackets.
pub fn write_objects(batch: &[MetricStats], out: &mut String) -> Result<()> {
    for (i, s) in batch.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::to_string(&stats_to_value(s))?);
    }
    Ok(())
}

/// `[{..},{..}]`.
pub fn write_array(batch: &[MetricStats], out: &mut String) -> Result<()> {
    out.push('[');
    write_objects(batch, out)?;
    out.push(']');
    Ok(())
}

fn node_to_value(n: &TimingNode) -> Value {
    let mut v = json!({
        "name": n.entry.id.name(),
        "order": n.entry.order,
        "depth": n.depth,
        "parent": n.parent,
        "start": n.entry.start_nanos / 1_000,
    });
    if let Some(obj) = v.as_object_mut() {
        match n.duration_nanos() {
            Some(d) => {
                obj.insert("total".into(), Value::from(d / 1_000));
                if let Some(s) = n.self_nanos {
                    obj.insert("self".into(), Value::from(s / 1_000));
                }
            }
            None => {
                obj.insert("incomplete".into(), Value::Bool(true));
            }
        }
        if let Some(o) = n.overlap_nanos {
            obj.insert("overlap".into(), Value::from(o / 1_000));
        }
    }
    v
}

/// `{"start": .., "spans": [..]}` with spans flat in pre-order; `parent` is
/// the position of the enclosing span in the same array.
pub fn timing_to_value(tree: &TimingTree) -> Value {
    json!({
        "start": tree.start_epoch_millis,
        "spans": tree.nodes().iter().map(node_to_value).collect::<Vec<_>>(),
    })
}

//! Call-tree reconstruction from a flat list of spans.
//!
//! Entries are walked in start order with a stack of open ancestors. The top
//! of the stack is popped while it does not contain the next entry, where
//! `A` contains `B` iff `A.start <= B.start && A.end >= B.end`. An incomplete
//! ancestor contains everything that starts after it; an incomplete entry is
//! contained by any ancestor that had not ended when it started.

use std::cmp::Ordering;
use std::fmt::Write;

use super::entry::{RequestTiming, TimingEntry};

/// One span of a rebuilt tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingNode {
    pub entry: TimingEntry,
    /// Nesting level in the rebuilt tree (roots are 0).
    pub depth: usize,
    /// Duration minus the direct children's durations. `None` when this span
    /// or one of its children did not complete.
    pub self_nanos: Option<u64>,
    /// Set when the direct children add up to more than this span's duration
    /// (overlapping siblings). `self_nanos` is then reported as 0.
    pub overlap_nanos: Option<u64>,
    /// Positions of the direct children in [`TimingTree::nodes`], in start order.
    pub children: Vec<usize>,
    /// Position of the parent in [`TimingTree::nodes`]; `None` for roots.
    pub parent: Option<usize>,
}

impl TimingNode {
    pub fn duration_nanos(&self) -> Option<u64> {
        self.entry.duration_nanos()
    }

    pub fn is_complete(&self) -> bool {
        self.entry.is_complete()
    }
}

/// One rendered row of a tree.
#[derive(Debug, Clone, Copy)]
pub struct TimingLine<'a> {
    pub node: &'a TimingNode,
    /// Share of the request root's duration, if both are known.
    pub percent: Option<f64>,
}

/// A request's spans as a flat pre-order arena.
///
/// Every subtree occupies a contiguous run of `nodes` starting at its root,
/// so walks are linear scans and nesting depth never touches the call stack.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingTree {
    pub start_epoch_millis: u64,
    nodes: Vec<TimingNode>,
    /// The request root first, then any spans it does not contain.
    roots: Vec<usize>,
}

impl TimingTree {
    pub fn build(timing: &RequestTiming) -> Self {
        let mut sorted: Vec<&TimingEntry> = timing.entries.iter().collect();
        sorted.sort_by(|a, b| start_order(a, b));

        let mut nodes: Vec<TimingNode> = Vec::with_capacity(sorted.len());
        let mut roots = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        for (idx, entry) in sorted.into_iter().enumerate() {
            while let Some(&top) = stack.last() {
                if contains(&nodes[top].entry, entry) {
                    break;
                }
                stack.pop();
            }
            let parent = stack.last().copied();
            match parent {
                Some(p) => nodes[p].children.push(idx),
                None => roots.push(idx),
            }
            nodes.push(TimingNode {
                entry: entry.clone(),
                depth: stack.len(),
                self_nanos: None,
                overlap_nanos: None,
                children: Vec::new(),
                parent,
            });
            stack.push(idx);
        }

        for idx in 0..nodes.len() {
            let (self_nanos, overlap_nanos) = self_time(&nodes, idx);
            nodes[idx].self_nanos = self_nanos;
            nodes[idx].overlap_nanos = overlap_nanos;
        }

        Self {
            start_epoch_millis: timing.start_epoch_millis,
            nodes,
            roots,
        }
    }

    /// The request root: first by start time, widest on ties.
    pub fn root(&self) -> Option<&TimingNode> {
        self.roots.first().map(|&r| &self.nodes[r])
    }

    pub fn roots(&self) -> impl Iterator<Item = &TimingNode> + '_ {
        self.roots.iter().map(|&r| &self.nodes[r])
    }

    /// All spans in pre-order.
    pub fn nodes(&self) -> &[TimingNode] {
        &self.nodes
    }

    pub fn children<'a>(&'a self, node: &'a TimingNode) -> impl Iterator<Item = &'a TimingNode> + 'a {
        node.children.iter().map(|&c| &self.nodes[c])
    }

    pub fn total_nanos(&self) -> Option<u64> {
        self.root().and_then(TimingNode::duration_nanos)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether any span is incomplete or has overlapping children.
    pub fn has_anomalies(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| !n.is_complete() || n.overlap_nanos.is_some())
    }

    /// Pre-order rows. Non-root spans below `threshold_percent` of the root
    /// duration are hidden together with their subtree.
    pub fn lines(&self, threshold_percent: f64) -> Vec<TimingLine<'_>> {
        let total = self.total_nanos();
        let mut out = Vec::new();
        // depth of the hidden span whose subtree is being skipped
        let mut hiding: Option<usize> = None;
        for n in &self.nodes {
            match hiding {
                Some(d) if n.depth > d => continue,
                _ => hiding = None,
            }
            let percent = match (n.duration_nanos(), total) {
                (Some(d), Some(t)) if t > 0 => Some(d as f64 * 100.0 / t as f64),
                (Some(_), Some(_)) => Some(100.0),
                _ => None,
            };
            let hidden = n.depth > 0
                && threshold_percent > 0.0
                && percent.is_some_and(|p| p < threshold_percent);
            if hidden {
                hiding = Some(n.depth);
                continue;
            }
            out.push(TimingLine { node: n, percent });
        }
        out
    }

    /// Indented text, one span per line.
    pub fn render_text(&self, threshold_percent: f64) -> String {
        let mut out = String::new();
        for line in self.lines(threshold_percent) {
            let n = line.node;
            let indent = "  ".repeat(n.depth);
            let _ = write!(out, "{indent}{}", n.entry.id);
            match n.duration_nanos() {
                None => {
                    let _ = write!(out, "  [did not complete]");
                }
                Some(d) => {
                    let _ = write!(out, "  total={}", fmt_millis(d));
                    if let Some(s) = n.self_nanos {
                        let _ = write!(out, " self={}", fmt_millis(s));
                    }
                    if let Some(p) = line.percent {
                        let _ = write!(out, " ({p:.1}%)");
                    }
                }
            }
            if let Some(o) = n.overlap_nanos {
                let _ = write!(out, " [overlap +{}]", fmt_millis(o));
            }
            out.push('\n');
        }
        out
    }
}

fn fmt_millis(nanos: u64) -> String {
    format!("{:.3}ms", nanos as f64 / 1_000_000.0)
}

/// Start ascending, then widest first (incomplete counts as widest), then record order.
fn start_order(a: &TimingEntry, b: &TimingEntry) -> Ordering {
    a.start_nanos
        .cmp(&b.start_nanos)
        .then_with(|| match (a.end_nanos, b.end_nanos) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        })
        .then_with(|| a.order.cmp(&b.order))
}

fn contains(ancestor: &TimingEntry, e: &TimingEntry) -> bool {
    if ancestor.start_nanos > e.start_nanos {
        return false;
    }
    match (ancestor.end_nanos, e.end_nanos) {
        (None, _) => true,
        (Some(a_end), Some(e_end)) => a_end >= e_end,
        (Some(a_end), None) => e.start_nanos < a_end,
    }
}

fn self_time(nodes: &[TimingNode], idx: usize) -> (Option<u64>, Option<u64>) {
    let node = &nodes[idx];
    let child_sum = node
        .children
        .iter()
        .map(|&c| nodes[c].duration_nanos())
        .try_fold(0u64, |acc, d| d.map(|d| acc.saturating_add(d)));

    match (node.duration_nanos(), child_sum) {
        (Some(d), Some(sum)) if sum > d => {
            tracing::warn!(
                span = %node.entry.id,
                duration_nanos = d,
                children_nanos = sum,
                "overlapping child spans exceed parent duration"
            );
            (Some(0), Some(sum - d))
        }
        (Some(d), Some(sum)) => (Some(d - sum), None),
        _ => (None, None),
    }
}

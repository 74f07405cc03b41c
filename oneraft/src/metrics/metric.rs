use std::cmp::Ordering;
use std::fmt;

use crate::Metrics;

/// A metric entry of a OneRaft node.
///
/// This is used to specify which metric to observe.
#[derive(Debug, Clone, Copy)]
pub enum Metric {
    Term(u64),
    LastLogIndex(u64),
    CommitIndex(u64),
    AppliedIndex(u64),
}

impl Metric {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Metric::Term(_) => "term",
            Metric::LastLogIndex(_) => "last_log_index",
            Metric::CommitIndex(_) => "commit_index",
            Metric::AppliedIndex(_) => "last_applied",
        }
    }

    fn value(&self) -> u64 {
        match self {
            Metric::Term(v)
            | Metric::LastLogIndex(v)
            | Metric::CommitIndex(v)
            | Metric::AppliedIndex(v) => *v,
        }
    }

    /// Read the field of `metrics` this metric refers to.
    fn read(&self, metrics: &Metrics) -> u64 {
        match self {
            Metric::Term(_) => metrics.current_term,
            Metric::LastLogIndex(_) => metrics.last_log_index,
            Metric::CommitIndex(_) => metrics.commit_index,
            Metric::AppliedIndex(_) => metrics.last_applied,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Metric can be compared with Metrics by comparing the corresponding field
/// of Metrics.
impl PartialEq<Metric> for Metrics {
    fn eq(&self, other: &Metric) -> bool {
        other.read(self) == other.value()
    }
}

/// Metric can be compared with Metrics by comparing the corresponding field
/// of Metrics.
impl PartialOrd<Metric> for Metrics {
    fn partial_cmp(&self, other: &Metric) -> Option<Ordering> {
        Some(other.read(self).cmp(&other.value()))
    }
}

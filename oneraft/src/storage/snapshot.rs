use std::fmt;

use crate::storage::log::log_id::LogId;

/// Identifies the log prefix a snapshot replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct SnapshotMeta {
    /// The last log id included in the snapshot.
    pub last_included: LogId,
}

impl fmt::Display for SnapshotMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{last_included:{}}}", self.last_included)
    }
}

/// A compressed run of committed entries, opaque to OneRaft.
///
/// `data` is produced by the application's state machine and handed back to
/// a state machine, possibly on another node, to restore it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub data: Vec<u8>,
}

impl Snapshot {
    pub fn new(last_included: LogId, data: Vec<u8>) -> Self {
        Self {
            meta: SnapshotMeta { last_included },
            data,
        }
    }

    pub fn last_included(&self) -> LogId {
        self.meta.last_included
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot{{{}, size:{}}}", self.meta, self.data.len())
    }
}

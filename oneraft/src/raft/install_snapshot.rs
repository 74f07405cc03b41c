use std::fmt;

use crate::storage::Snapshot;
use crate::NodeId;

/// An RPC sent by the leader to a follower whose next entry has been
/// compacted into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct InstallSnapshot {
    pub term: u64,
    pub leader_id: NodeId,
    pub snapshot: Snapshot,
}

impl fmt::Display for InstallSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{term:{}, leader:{}, {}}}",
            self.term, self.leader_id, self.snapshot
        )
    }
}

/// The response to an [`InstallSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct InstallSnapshotReply {
    pub term: u64,
}

impl fmt::Display for InstallSnapshotReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{term:{}}}", self.term)
    }
}

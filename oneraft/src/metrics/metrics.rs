use std::fmt;

use crate::base::DisplayOptionExt;
use crate::errors::Fatal;
use crate::metrics::ServerState;
use crate::storage::log::log_id::LogId;
use crate::NodeId;

/// A set of metrics describing the current state of a OneRaft node.
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Metrics {
    pub running_state: Result<(), Fatal>,

    /// The ID of the node.
    pub id: NodeId,

    /// The last persisted term.
    pub current_term: u64,

    /// The candidate this node voted for in `current_term`.
    pub voted_for: Option<NodeId>,

    /// The state of the node.
    pub server_state: ServerState,

    /// The current cluster leader, if known.
    pub current_leader: Option<NodeId>,

    /// The index of the last log entry, including the compacted prefix.
    pub last_log_index: u64,

    /// The highest log index known to be committed.
    pub commit_index: u64,

    /// The highest log index the state machine has received.
    pub last_applied: u64,

    /// The last log id covered by the latest snapshot.
    pub snapshot: Option<LogId>,
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics{{id:{}, {}, term:{}, voted_for:{}, leader:{}, \
             last_log:{}, committed:{}, applied:{}, snapshot:{}}}",
            self.id,
            self.server_state,
            self.current_term,
            self.voted_for.display(),
            self.current_leader.display(),
            self.last_log_index,
            self.commit_index,
            self.last_applied,
            self.snapshot.display(),
        )
    }
}

impl Metrics {
    pub fn new_initial(id: NodeId) -> Self {
        Self {
            running_state: Ok(()),
            id,
            current_term: 0,
            voted_for: None,
            server_state: ServerState::Follower,
            current_leader: None,
            last_log_index: 0,
            commit_index: 0,
            last_applied: 0,
            snapshot: None,
        }
    }
}

use std::fmt;

use crate::base::DisplayOptionExt;
use crate::base::DisplaySliceExt;
use crate::storage::log::entry::Entry;
use crate::storage::log::log_id::LogId;
use crate::AppData;
use crate::NodeId;

/// An RPC sent by the leader to replicate log entries (§5.3), also used as
/// heartbeat (§5.2) when `entries` is empty.
#[derive(Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(bound = "")]
pub struct AppendEntries<D>
where D: AppData
{
    pub term: u64,
    pub leader_id: NodeId,

    /// The log id immediately preceding `entries`, `None` for the position
    /// before the first log.
    pub prev_log_id: Option<LogId>,

    pub entries: Vec<Entry<D>>,

    /// The leader's commit index.
    pub leader_commit: u64,
}

impl<D> fmt::Debug for AppendEntries<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppendEntries")
            .field("term", &self.term)
            .field("leader_id", &self.leader_id)
            .field("prev_log_id", &self.prev_log_id)
            .field("entries", &self.entries)
            .field("leader_commit", &self.leader_commit)
            .finish()
    }
}

impl<D> fmt::Display for AppendEntries<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{term:{}, leader:{}, prev:{}, entries:{}, commit:{}}}",
            self.term,
            self.leader_id,
            self.prev_log_id.display(),
            self.entries.display(),
            self.leader_commit
        )
    }
}

/// Tells the leader where to resume replication after a failed consistency
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct ConflictHint {
    /// The term of the follower's entry at `prev_log_id.index`, `None` if the
    /// follower has no entry there.
    pub term: Option<u64>,

    /// With `term`: the first index the follower holds for that term.
    /// Without: the next index the follower is able to accept.
    pub index: u64,
}

impl fmt::Display for ConflictHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{term:{}, index:{}}}", self.term.display(), self.index)
    }
}

/// The response to an [`AppendEntries`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct AppendEntriesReply {
    /// The term of the follower, for the leader to update itself.
    pub term: u64,

    pub success: bool,

    /// Present when the follower rejected a request of the current term
    /// because its log does not contain `prev_log_id`.
    pub conflict: Option<ConflictHint>,
}

impl AppendEntriesReply {
    pub fn success(term: u64) -> Self {
        Self {
            term,
            success: true,
            conflict: None,
        }
    }

    /// The request carries a stale term.
    pub fn stale(term: u64) -> Self {
        Self {
            term,
            success: false,
            conflict: None,
        }
    }

    pub fn conflict(term: u64, hint: ConflictHint) -> Self {
        Self {
            term,
            success: false,
            conflict: Some(hint),
        }
    }
}

impl fmt::Display for AppendEntriesReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{term:{}, success:{}, conflict:{}}}",
            self.term,
            self.success,
            self.conflict.display()
        )
    }
}

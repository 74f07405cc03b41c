//! Error types exposed by this crate.

use std::error::Error;
use std::io;

use anyerror::AnyError;

use crate::storage::log::log_id::LogId;
use crate::NodeId;

/// Fatal is unrecoverable and shuts down raft at once.
///
/// A node never keeps running on state it failed to persist: once a `Fatal`
/// is raised, every background task quits and every API call returns it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum Fatal {
    #[error(transparent)]
    StorageError(#[from] AnyError),

    #[error("state machine error: {0}")]
    StateMachineError(AnyError),

    #[error("panicked")]
    Panicked,

    /// OneRaft stopped normally.
    #[error("Stopped normally")]
    Stopped,
}

impl From<io::Error> for Fatal {
    fn from(value: io::Error) -> Self {
        Fatal::StorageError(AnyError::new(&value))
    }
}

impl Fatal {
    pub(crate) fn state_machine(e: &io::Error) -> Self {
        Fatal::StateMachineError(AnyError::new(e))
    }
}

/// Error that indicates a **temporary** network error.
///
/// A task that gets this error from a [`Connection`](crate::Connection)
/// retries on its own schedule: an election round waits for the next
/// election timeout, a replication session for the next heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("NetworkError: {source}")]
pub struct NetworkError {
    #[from]
    source: AnyError,
}

impl NetworkError {
    pub fn new<E: Error + 'static>(e: &E) -> Self {
        Self {
            source: AnyError::new(e),
        }
    }
}

/// Returned by a node that is not the leader of the current term.
///
/// The application has to resend the request to `leader_id`, if it is known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
#[error("has to forward request to: {leader_id:?}")]
pub struct ForwardToLeader {
    pub leader_id: Option<NodeId>,
}

impl ForwardToLeader {
    pub const fn empty() -> Self {
        Self { leader_id: None }
    }

    pub fn new(leader_id: NodeId) -> Self {
        Self {
            leader_id: Some(leader_id),
        }
    }
}

/// The application asked to build a snapshot that can not replace the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum SnapshotRejected {
    /// The log is already compacted up to `snapshot_last`.
    #[error("snapshot at index {index} is not newer than the current one: {snapshot_last}")]
    Stale { index: u64, snapshot_last: LogId },

    /// Only entries the state machine has seen can be compacted.
    #[error("snapshot at index {index} is beyond the applied index {last_applied}")]
    NotApplied { index: u64, last_applied: u64 },
}

use std::fmt;

use crate::base::DisplayOptionExt;
use crate::storage::log::log_id::LogId;
use crate::NodeId;

/// An RPC sent by candidates to gather votes (§5.2).
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct RequestVote {
    pub term: u64,
    pub candidate_id: NodeId,

    /// The last log id of the candidate, `None` if its log is empty.
    pub last_log_id: Option<LogId>,
}

impl fmt::Display for RequestVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{term:{}, candidate:{}, last_log:{}}}",
            self.term,
            self.candidate_id,
            self.last_log_id.display(),
        )
    }
}

impl RequestVote {
    pub fn new(
        term: u64,
        candidate_id: NodeId,
        last_log_id: Option<LogId>,
    ) -> Self {
        Self {
            term,
            candidate_id,
            last_log_id,
        }
    }
}

/// The response to a [`RequestVote`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct VoteReply {
    /// The term of the voter after handling the request, for the candidate
    /// to update itself.
    pub term: u64,

    /// It is true if the voter granted and saved its vote.
    pub vote_granted: bool,
}

impl VoteReply {
    pub fn new(term: u64, granted: bool) -> Self {
        Self {
            term,
            vote_granted: granted,
        }
    }
}

impl fmt::Display for VoteReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{term:{}, granted:{}}}", self.term, self.vote_granted)
    }
}

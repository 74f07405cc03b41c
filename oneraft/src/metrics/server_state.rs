use std::fmt;

/// All possible states of a OneRaft node.
#[derive(Debug, Clone, Copy, Default)]
#[derive(PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum ServerState {
    /// The node is replicating logs from the leader.
    #[default]
    Follower,
    /// The node is campaigning to become the cluster leader.
    Candidate,
    /// The node is the cluster leader.
    Leader,
}

impl ServerState {
    pub fn is_leader(&self) -> bool {
        *self == ServerState::Leader
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

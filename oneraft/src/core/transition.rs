use std::fmt;

use crate::metrics::ServerState;

/// A change of `(role, term)` observed at the end of a critical section.
///
/// It is consumed by the dispatcher to start the tasks of the new role.
/// Tasks of the old role are never told to stop: they notice the change
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) server_state: ServerState,
    pub(crate) term: u64,
}

impl Transition {
    pub(crate) fn new(server_state: ServerState, term: u64) -> Self {
        Self { server_state, term }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.server_state, self.term)
    }
}

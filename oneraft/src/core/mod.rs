//! The consensus engine of a node.
//!
//! All state lives in one [`RaftState`](raft_state::RaftState) behind the
//! lock owned by [`Shared`](shared::Shared). Inbound RPCs, timers, election
//! rounds, replication sessions and the apply worker are separate tasks that
//! each take the lock for a short critical section and never block while
//! holding it.

pub(crate) mod apply;
pub(crate) mod dispatcher;
pub(crate) mod election;
pub(crate) mod handlers;
pub(crate) mod raft_state;
pub(crate) mod replication;
pub(crate) mod shared;
pub(crate) mod transition;

//! A quorum is a set of nodes a vote request or append-entries request has to
//! contact to. OneRaft only uses the **majority** of a fixed member set.

mod quorum_set;
mod quorum_set_impl;


pub(crate) use quorum_set::QuorumSet;

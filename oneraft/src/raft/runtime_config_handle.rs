//! RuntimeConfigHandle is an interface to change OneRaft runtime config.

use std::sync::atomic::Ordering;

use crate::raft::RaftInner;
use crate::AppData;

/// RuntimeConfigHandle is an interface to update runtime config.
///
/// These config are mainly designed for testing purpose and special use cases.
/// Usually you don't need to change runtime config.
pub struct RuntimeConfigHandle<'r, D>
where D: AppData
{
    raft_inner: &'r RaftInner<D>,
}

impl<'r, D> RuntimeConfigHandle<'r, D>
where D: AppData
{
    pub(in crate::raft) fn new(raft_inner: &'r RaftInner<D>) -> Self {
        Self { raft_inner }
    }

    /// Enable or disable heartbeat message when a leader has no more log to
    /// replicate.
    ///
    /// Note that a follower that does not hear from the leader will start
    /// election(if `Self::elect()` is enabled) when its election timeout
    /// passes.
    pub fn heartbeat(&self, enabled: bool) {
        self.raft_inner
            .runtime_config
            .enable_heartbeat
            .store(enabled, Ordering::Relaxed);
    }

    /// Enable or disable election for a follower when its election timeout
    /// passes.
    pub fn elect(&self, enabled: bool) {
        self.raft_inner
            .runtime_config
            .enable_elect
            .store(enabled, Ordering::Relaxed);
    }
}

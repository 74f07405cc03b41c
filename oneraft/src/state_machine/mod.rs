//! The consumer side of the commit pipeline.

use std::io;

use openraft_macros::add_async_trait;

use crate::storage::log::entry::Entry;
use crate::storage::Snapshot;
use crate::AppData;

/// The application state machine fed with committed entries.
///
/// OneRaft calls these methods from a single apply worker, one at a time and
/// in strictly increasing log index order, never while holding any lock of
/// the node. A slow state machine only delays `last_applied`; it never blocks
/// election or replication.
///
/// Delivery is exactly-once within a run. After a restart, the node restores
/// the last snapshot with [`install_snapshot`](Self::install_snapshot) and
/// then delivers the committed entries that follow it again, thus an
/// implementation must be idempotent by log index.
///
/// An error returned from either method is fatal to the node.
#[add_async_trait]
pub trait StateMachine<D>: Send + 'static
where D: AppData
{
    /// Apply one committed entry.
    ///
    /// Blank entries proposed by a new leader are delivered too, so that the
    /// applied index advances without a gap.
    async fn apply(&mut self, entry: Entry<D>) -> Result<(), io::Error>;

    /// Replace the entire state with a snapshot received from the leader or
    /// loaded at startup.
    async fn install_snapshot(
        &mut self,
        snapshot: Snapshot,
    ) -> Result<(), io::Error>;
}

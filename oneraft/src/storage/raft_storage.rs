//! Defines the [`RaftStorage`] trait, the persistence boundary of a node.

use std::io;

use crate::storage::PersistentState;
use crate::storage::Snapshot;
use crate::AppData;

/// API for durable storage of a node.
///
/// OneRaft decides **what** has to be durable and **when**; the storage engine
/// behind this trait decides **how**.
///
/// The methods are synchronous: they are called inside the critical section
/// that mutates the node state, right before the reply or RPC that depends on
/// the saved state is released. An implementation must not return until the
/// data is durable.
///
/// ### To ensure correctness:
///
/// - A `load_state()` after a crash must return a state at least as fresh as
///   the last successful `save_state()`.
/// - `save_snapshot()` is always called before the `save_state()` that drops
///   the compacted prefix from the log.
/// - Any error is fatal: the node stops at once and never acts on unsaved
///   state.
pub trait RaftStorage<D>: Send + 'static
where D: AppData
{
    /// Load the persistent state saved by the last `save_state()`, or `None`
    /// for a pristine node.
    fn load_state(&mut self) -> Result<Option<PersistentState<D>>, io::Error>;

    /// Durably save the entire persistent state.
    fn save_state(
        &mut self,
        state: &PersistentState<D>,
    ) -> Result<(), io::Error>;

    /// Load the last saved snapshot.
    fn load_snapshot(&mut self) -> Result<Option<Snapshot>, io::Error>;

    /// Durably save a snapshot, replacing the previous one.
    fn save_snapshot(
        &mut self,
        snapshot: &Snapshot,
    ) -> Result<(), io::Error>;
}

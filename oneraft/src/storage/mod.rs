//! The OneRaft storage interface and data types.

pub mod log;
mod persistent_state;
mod raft_storage;
mod snapshot;

pub use self::persistent_state::PersistentState;
pub use self::raft_storage::RaftStorage;
pub use self::snapshot::Snapshot;
pub use self::snapshot::SnapshotMeta;

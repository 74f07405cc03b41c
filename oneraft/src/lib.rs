#![doc = include_str!("lib_readme.md")]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::bool_comparison)]
#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]
#![deny(unused_qualifications)]

pub extern crate openraft_macros;

mod config;
mod core;
mod quorum;

pub mod app;
pub mod base;
pub mod errors;
pub mod metrics;
pub mod network;
pub mod raft;
pub mod state_machine;
pub mod storage;
pub mod testing;

pub use anyerror;
pub use anyerror::AnyError;
pub use openraft_macros::add_async_trait;

pub use crate::app::AppData;
pub use crate::config::Config;
pub use crate::config::ConfigError;
pub use crate::metrics::Metrics;
pub use crate::metrics::ServerState;
pub use crate::network::Connection;
pub use crate::network::Network;
pub use crate::raft::Raft;
pub use crate::state_machine::StateMachine;
pub use crate::storage::log::entry::Entry;
pub use crate::storage::log::entry::EntryPayload;
pub use crate::storage::log::log_id::LogId;
pub use crate::storage::log::log_id::LogIdOptionExt;
pub use crate::storage::RaftStorage;
pub use crate::storage::Snapshot;
pub use crate::storage::SnapshotMeta;

/// Identifies a member of the cluster.
pub type NodeId = u64;

//! The OneRaft network interface.

use openraft_macros::add_async_trait;

pub use crate::network::connection::Connection;
use crate::NodeId;

mod connection;

/// A trait defining the interface for a OneRaft network factory to create
/// connections between cluster members.
///
/// The network is cloned into every background task that talks to peers:
/// each election round and each per-peer replication session.
#[add_async_trait]
pub trait Network<D>: Clone + Send + Sync + 'static
where D: crate::AppData
{
    /// Actual type of the network handling a single connection.
    type Connection: Connection<D>;

    /// Create a new network instance sending RPCs to the target node.
    ///
    /// This function should **not** create a connection but rather a client
    /// that will connect when required. Therefore, there is chance it will
    /// build a client that is unable to send out anything, e.g., in case
    /// the network address is configured incorrectly. But this method
    /// does not return an error because OneRaft can only ignore it: every RPC
    /// failure is retried later.
    async fn new_connection(&mut self, target: NodeId) -> Self::Connection;
}

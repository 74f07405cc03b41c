use openraft_macros::add_async_trait;

use crate::errors::NetworkError;
use crate::raft::AppendEntries;
use crate::raft::AppendEntriesReply;
use crate::raft::InstallSnapshot;
use crate::raft::InstallSnapshotReply;
use crate::raft::RequestVote;
use crate::raft::VoteReply;
use crate::AppData;

/// A client sending RPCs to a single target node.
///
/// An `Err(NetworkError)` means the RPC may or may not have been delivered
/// and no reply is available. OneRaft never reads it as a negative answer.
#[add_async_trait]
pub trait Connection<D>: Send + Sync + 'static
where D: AppData
{
    /// Send a RequestVote RPC to the target.
    async fn request_vote(
        &mut self,
        rpc: RequestVote,
    ) -> Result<VoteReply, NetworkError>;

    /// Send an AppendEntries RPC to the target.
    async fn append_entries(
        &mut self,
        rpc: AppendEntries<D>,
    ) -> Result<AppendEntriesReply, NetworkError>;

    /// Send an InstallSnapshot RPC to the target.
    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshot,
    ) -> Result<InstallSnapshotReply, NetworkError>;
}

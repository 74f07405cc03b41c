//! An in-process network that delivers an RPC by calling the `handle_*`
//! method of the target [`Raft`] handle.
//!
//! Links can be cut by isolating a node or by partitioning the cluster; an
//! RPC over a cut link, or to a node that is not registered, fails with a
//! [`NetworkError`].


use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use oneraft::errors::NetworkError;
use oneraft::raft::AppendEntries;
use oneraft::raft::AppendEntriesReply;
use oneraft::raft::InstallSnapshot;
use oneraft::raft::InstallSnapshotReply;
use oneraft::raft::RequestVote;
use oneraft::raft::VoteReply;
use oneraft::AnyError;
use oneraft::AppData;
use oneraft::Connection;
use oneraft::Network;
use oneraft::NodeId;
use oneraft::Raft;
use tracing::debug;

struct Router<D>
where D: AppData
{
    peers: BTreeMap<NodeId, Raft<D>>,

    isolated: BTreeSet<NodeId>,

    /// When set, only nodes in the same group can talk to each other.
    groups: Option<Vec<BTreeSet<NodeId>>>,

    /// Delay every RPC by this long, in each direction.
    delay: Option<Duration>,
}

impl<D> Router<D>
where D: AppData
{
    fn is_reachable(&self, a: NodeId, b: NodeId) -> bool {
        if self.isolated.contains(&a) || self.isolated.contains(&b) {
            return false;
        }

        match &self.groups {
            None => true,
            Some(groups) => {
                groups.iter().any(|g| g.contains(&a) && g.contains(&b))
            }
        }
    }
}

/// A network shared by every node of an in-process cluster.
///
/// The value registered with [`DirectNetwork::add_peer`] is the registry; a
/// node sends through the view returned by [`DirectNetwork::for_node`], which
/// knows the source end of every link.
pub struct DirectNetwork<D>
where D: AppData
{
    source: Option<NodeId>,
    router: Arc<Mutex<Router<D>>>,
}

impl<D> Clone for DirectNetwork<D>
where D: AppData
{
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            router: self.router.clone(),
        }
    }
}

impl<D> Default for DirectNetwork<D>
where D: AppData
{
    fn default() -> Self {
        let router = Router {
            peers: BTreeMap::new(),
            isolated: BTreeSet::new(),
            groups: None,
            delay: None,
        };
        Self {
            source: None,
            router: Arc::new(Mutex::new(router)),
        }
    }
}

impl<D> fmt::Debug for DirectNetwork<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectNetwork")
            .field("source", &self.source)
            .finish()
    }
}

impl<D> DirectNetwork<D>
where D: AppData
{
    fn lock(&self) -> MutexGuard<'_, Router<D>> {
        match self.router.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The view of this network for node `id` to send RPCs through.
    pub fn for_node(&self, id: NodeId) -> Self {
        Self {
            source: Some(id),
            router: self.router.clone(),
        }
    }

    pub fn add_peer(&self, node_id: NodeId, raft: Raft<D>) {
        self.lock().peers.insert(node_id, raft);
    }

    pub fn remove_peer(&self, node_id: NodeId) -> Option<Raft<D>> {
        self.lock().peers.remove(&node_id)
    }

    pub fn get_peer(&self, node_id: &NodeId) -> Option<Raft<D>> {
        self.lock().peers.get(node_id).cloned()
    }

    /// Cut every link of a node.
    pub fn isolate(&self, node_id: NodeId) {
        debug!("DirectNetwork: isolate {}", node_id);
        self.lock().isolated.insert(node_id);
    }

    /// Split the cluster: a node can only reach the nodes in its own group.
    /// A node in no group reaches nobody.
    pub fn partition(&self, groups: Vec<BTreeSet<NodeId>>) {
        debug!("DirectNetwork: partition {:?}", groups);
        self.lock().groups = Some(groups);
    }

    /// Restore every link.
    pub fn heal(&self) {
        debug!("DirectNetwork: heal");
        let mut r = self.lock();
        r.isolated.clear();
        r.groups = None;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Find the target if the link to it is up.
    fn route(
        &self,
        target: NodeId,
    ) -> Result<(Raft<D>, Option<Duration>), NetworkError> {
        let r = self.lock();

        if let Some(source) = self.source {
            if !r.is_reachable(source, target) {
                return Err(unreachable(self.source, target));
            }
        }

        let Some(peer) = r.peers.get(&target) else {
            return Err(NetworkError::from(AnyError::error(format!(
                "node {} is not found",
                target
            ))));
        };

        Ok((peer.clone(), r.delay))
    }

    /// Check the link again when the reply travels back.
    fn check_back(&self, target: NodeId) -> Result<(), NetworkError> {
        let Some(source) = self.source else {
            return Ok(());
        };

        if self.lock().is_reachable(target, source) {
            Ok(())
        } else {
            Err(unreachable(self.source, target))
        }
    }
}

fn unreachable(source: Option<NodeId>, target: NodeId) -> NetworkError {
    NetworkError::from(AnyError::error(format!(
        "link {:?} - {} is down",
        source, target
    )))
}

impl<D> Network<D> for DirectNetwork<D>
where D: AppData
{
    type Connection = Conn<D>;

    async fn new_connection(&mut self, target: NodeId) -> Self::Connection {
        Conn {
            target,
            net: self.clone(),
        }
    }
}

/// A connection to one peer.
///
/// The peer is looked up on every RPC, thus a connection outlives a restart
/// of its target.
pub struct Conn<D>
where D: AppData
{
    target: NodeId,
    net: DirectNetwork<D>,
}

impl<D> Conn<D>
where D: AppData
{
    async fn delay(d: Option<Duration>) {
        if let Some(d) = d {
            tokio::time::sleep(d).await;
        }
    }
}

impl<D> Connection<D> for Conn<D>
where D: AppData
{
    async fn request_vote(
        &mut self,
        rpc: RequestVote,
    ) -> Result<VoteReply, NetworkError> {
        let (peer, delay) = self.net.route(self.target)?;
        Self::delay(delay).await;

        let reply = peer
            .handle_request_vote(rpc)
            .await
            .map_err(|e| NetworkError::new(&e))?;

        Self::delay(delay).await;
        self.net.check_back(self.target)?;
        Ok(reply)
    }

    async fn append_entries(
        &mut self,
        rpc: AppendEntries<D>,
    ) -> Result<AppendEntriesReply, NetworkError> {
        let (peer, delay) = self.net.route(self.target)?;
        Self::delay(delay).await;

        let reply = peer
            .handle_append_entries(rpc)
            .await
            .map_err(|e| NetworkError::new(&e))?;

        Self::delay(delay).await;
        self.net.check_back(self.target)?;
        Ok(reply)
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshot,
    ) -> Result<InstallSnapshotReply, NetworkError> {
        let (peer, delay) = self.net.route(self.target)?;
        Self::delay(delay).await;

        let reply = peer
            .handle_install_snapshot(rpc)
            .await
            .map_err(|e| NetworkError::new(&e))?;

        Self::delay(delay).await;
        self.net.check_back(self.target)?;
        Ok(reply)
    }
}

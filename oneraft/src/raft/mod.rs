//! Public interface and data types.
//!
//! [`Raft`] serves as the primary interface to a OneRaft node. Cloning it is
//! cheap: every clone drives the same node.

mod append_entries;
mod inner;
mod install_snapshot;
mod request_vote;
mod runtime_config_handle;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;
use tracing::Level;

pub use self::append_entries::AppendEntries;
pub use self::append_entries::AppendEntriesReply;
pub use self::append_entries::ConflictHint;
pub use self::install_snapshot::InstallSnapshot;
pub use self::install_snapshot::InstallSnapshotReply;
pub use self::request_vote::RequestVote;
pub use self::request_vote::VoteReply;
pub use self::runtime_config_handle::RuntimeConfigHandle;
use crate::config::Config;
use crate::config::RuntimeConfig;
use crate::core::apply::run_apply_worker;
use crate::core::dispatcher::Dispatcher;
use crate::core::election::run_election_timer;
use crate::core::raft_state::RaftState;
use crate::core::shared::Shared;
use crate::errors::Fatal;
use crate::errors::ForwardToLeader;
use crate::errors::SnapshotRejected;
use crate::metrics::Metrics;
use crate::metrics::Wait;
use crate::raft::inner::RaftInner;
use crate::storage::log::log_id::LogId;
use crate::storage::RaftStorage;
use crate::AppData;
use crate::Network;
use crate::NodeId;
use crate::StateMachine;

/// The OneRaft API.
///
/// ### Clone
///
/// This type implements `Clone`, and cloning itself is very cheap and helps to
/// facilitate use with async workflows.
///
/// ### Shutting down
///
/// If any of the interfaces returns a [`Fatal`], this indicates that
/// the node is shutting down. If the parent application needs to
/// shutdown the node for any reason, calling `shutdown` will do the
/// trick.
pub struct Raft<D>
where D: AppData
{
    inner: Arc<RaftInner<D>>,
}

impl<D> Clone for Raft<D>
where D: AppData
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D> Raft<D>
where D: AppData
{
    /// Load the state from `storage` and spawn the tasks of a node.
    ///
    /// It must be called inside a tokio runtime.
    ///
    /// ### `id`
    /// The ID which the node uses to identify itself within the cluster.
    /// Applications must guarantee that the ID is stable across restarts,
    /// since votes and logs are saved on behalf of it.
    ///
    /// ### `config`
    /// The runtime config. See the docs on the `Config` object for more
    /// details.
    ///
    /// ### `members`
    /// All the members of the cluster, including `id`. The set is fixed.
    ///
    /// ### `network`
    /// An implementation of the [`Network`] trait which will be used
    /// by OneRaft for sending RPCs to peer nodes within the cluster.
    ///
    /// ### `storage`
    /// An implementation of the [`RaftStorage`] trait, where term, vote, log
    /// and snapshot are saved.
    ///
    /// ### `state_machine`
    /// An implementation of the [`StateMachine`] trait that receives the
    /// committed entries.
    #[tracing::instrument(level = "debug", skip_all, fields(id = id))]
    pub async fn new<N, S, SM>(
        id: NodeId,
        config: Arc<Config>,
        members: BTreeSet<NodeId>,
        network: N,
        storage: S,
        state_machine: SM,
    ) -> Result<Self, Fatal>
    where
        N: Network<D>,
        S: RaftStorage<D>,
        SM: StateMachine<D>,
    {
        let state = RaftState::load(
            id,
            config.clone(),
            members,
            Box::new(storage),
        )?;

        let (tx_transition, rx_transition) = mpsc::unbounded_channel();
        let (tx_metrics, rx_metrics) = watch::channel(state.metrics());
        let runtime_config = Arc::new(RuntimeConfig::new(&config));

        let shared = Arc::new(Shared::new(
            state,
            runtime_config.clone(),
            tx_transition,
            tx_metrics,
        ));

        // Queue the restored snapshot.
        shared.with_state(|_st| Ok(()))?;

        let span = tracing::span!(
            parent: tracing::Span::current(),
            Level::DEBUG,
            "Raft",
            id = display(id),
        );

        let dispatcher = Dispatcher {
            shared: shared.clone(),
            network,
            rx_transition,
            tasks: JoinSet::new(),
        };

        let handles = vec![
            tokio::spawn(dispatcher.main().instrument(span.clone())),
            tokio::spawn(
                run_election_timer(shared.clone()).instrument(span.clone()),
            ),
            tokio::spawn(
                run_apply_worker(shared.clone(), state_machine).instrument(span),
            ),
        ];

        let inner = RaftInner {
            id,
            config,
            runtime_config,
            shared,
            rx_metrics,
            handles: Mutex::new(handles),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Return a handle to update runtime config.
    ///
    /// Such enabling/disabling heartbeat, election, etc.
    ///
    /// Example:
    /// ```ignore
    /// let raft = Raft::new(...).await?;
    /// raft.runtime_config().heartbeat(true);
    /// raft.runtime_config().elect(true);
    /// ```
    pub fn runtime_config(&self) -> RuntimeConfigHandle<'_, D> {
        RuntimeConfigHandle::new(self.inner.as_ref())
    }

    /// Return the config of this node.
    pub fn config(&self) -> &Arc<Config> {
        &self.inner.config
    }

    /// Start an election at once, unless this node is the leader.
    ///
    /// It is not affected by `runtime_config().elect(false)`.
    pub async fn trigger_elect(&self) -> Result<(), Fatal> {
        self.inner.shared.with_state(|st| {
            if st.is_leader() {
                return Ok(());
            }
            st.start_election()
        })
    }

    /// Submit a RequestVote RPC to this node.
    ///
    /// These RPCs are sent by cluster peers which are in candidate state
    /// attempting to gather votes (§5.2).
    pub async fn handle_request_vote(
        &self,
        rpc: RequestVote,
    ) -> Result<VoteReply, Fatal> {
        self.inner.shared.with_state(|st| st.handle_request_vote(rpc))
    }

    /// Submit an AppendEntries RPC to this node.
    ///
    /// These RPCs are sent by the cluster leader to replicate log entries
    /// (§5.3), and are also used as heartbeats (§5.2).
    pub async fn handle_append_entries(
        &self,
        rpc: AppendEntries<D>,
    ) -> Result<AppendEntriesReply, Fatal> {
        self.inner.shared.with_state(|st| st.handle_append_entries(rpc))
    }

    /// Submit an InstallSnapshot RPC to this node.
    ///
    /// These RPCs are sent by the cluster leader to bring a new node or a
    /// slow node up-to-speed with the leader (§7).
    pub async fn handle_install_snapshot(
        &self,
        rpc: InstallSnapshot,
    ) -> Result<InstallSnapshotReply, Fatal> {
        self.inner.shared.with_state(|st| st.handle_install_snapshot(rpc))
    }

    /// Submit a command to be appended to the log (§5.1).
    ///
    /// It returns the log id assigned to the command as soon as it is appended
    /// to the leader's log, or [`ForwardToLeader`] if this node is not the
    /// leader. The command takes effect when the state machine receives it.
    ///
    /// If the leader crashes after committing a log entry but before
    /// responding to the client, the client may retry the command with a new
    /// leader, causing it to be applied a second time. Clients should assign
    /// unique serial numbers to commands that must not be applied twice.
    #[tracing::instrument(level = "debug", skip(self, data))]
    pub async fn submit(
        &self,
        data: D,
    ) -> Result<Result<LogId, ForwardToLeader>, Fatal> {
        self.inner.shared.with_state(|st| st.submit(data))
    }

    /// Compact the log up to `index` into a snapshot whose content is `data`.
    ///
    /// `data` must be the state of the state machine right after applying
    /// `index`, which must already have been delivered to it.
    #[tracing::instrument(level = "debug", skip(self, data))]
    pub async fn snapshot(
        &self,
        index: u64,
        data: Vec<u8>,
    ) -> Result<Result<(), SnapshotRejected>, Fatal> {
        self.inner.shared.with_state(|st| st.build_snapshot(index, data))
    }

    /// Returns `true` if this node believes it is the leader.
    pub fn is_leader(&self) -> bool {
        self.inner.shared.with_state(|st| Ok(st.is_leader())).unwrap_or(false)
    }

    /// Get the ID of the current leader from this node.
    ///
    /// This method is based on the metrics, it is good for deciding where to
    /// route client requests.
    pub fn current_leader(&self) -> Option<NodeId> {
        self.inner.rx_metrics.borrow().current_leader
    }

    /// Get a handle to the metrics channel.
    pub fn metrics(&self) -> watch::Receiver<Metrics> {
        self.inner.rx_metrics.clone()
    }

    /// Get a handle to wait for the metrics to satisfy some condition.
    ///
    /// If `timeout` is `None`, then it will wait forever(10 years).
    /// If `timeout` is `Some`, then it will wait for the specified duration.
    ///
    /// ```ignore
    /// # use std::time::Duration;
    /// # use oneraft::{ServerState, Raft};
    ///
    /// let timeout = Duration::from_millis(200);
    ///
    /// // wait for log-3 to be received and applied:
    /// r.wait(Some(timeout)).applied_index_at_least(3, "log").await?;
    ///
    /// // wait for ever for raft node's current leader to become 3:
    /// r.wait(None).current_leader(2, "wait for leader").await?;
    ///
    /// // wait for raft state to become a follower
    /// r.wait(None).state(ServerState::Follower, "state").await?;
    /// ```
    pub fn wait(&self, timeout: Option<Duration>) -> Wait {
        let timeout = match timeout {
            Some(t) => t,
            None => Duration::from_secs(86400 * 365 * 100),
        };
        Wait {
            timeout,
            rx: self.inner.rx_metrics.clone(),
        }
    }

    /// Shutdown this node and wait for all its tasks to quit.
    ///
    /// Every API call returns [`Fatal::Stopped`] afterwards.
    pub async fn shutdown(&self) -> Result<(), Fatal> {
        self.inner.shared.stop();
        self.inner.join_tasks().await
    }
}

//! Fixtures for testing a OneRaft cluster running in one process.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;
use std::time::Duration;

use anyhow::Context;
use lazy_static::lazy_static;
use memstore::Cmd;
use memstore::MemStateMachine;
use memstore::MemStorage;
use oneraft::metrics::Wait;
use oneraft::Config;
use oneraft::LogId;
use oneraft::Metrics;
use oneraft::NodeId;
use oneraft::Raft;
use oneraft::ServerState;
use pseudonet::DirectNetwork;
use tokio::time::Instant;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

lazy_static! {
    static ref GLOBAL_UT_LOG_GUARD: Arc<Mutex<Option<WorkerGuard>>> =
        Arc::new(Mutex::new(None));
}

/// Initialize the tracing system once for all tests in a binary.
pub fn init_default_ut_tracing() {
    static START: Once = Once::new();

    START.call_once(|| {
        let g = init_global_tracing("ut", "_log", "DEBUG");
        let mut guard = GLOBAL_UT_LOG_GUARD.lock().unwrap();
        *guard = Some(g);
    });
}

fn init_global_tracing(app_name: &str, dir: &str, level: &str) -> WorkerGuard {
    let f = RollingFileAppender::new(Rotation::NEVER, dir, app_name);
    let (writer, writer_guard) = tracing_appender::non_blocking(f);

    let f_layer = fmt::Layer::new()
        .with_span_events(fmt::format::FmtSpan::NONE)
        .with_writer(writer)
        .with_ansi(false);

    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .unwrap_or_else(|_x| level.to_string());

    let subscriber = Registry::default()
        .with(EnvFilter::new(directives))
        .with(f_layer);

    tracing::subscriber::set_global_default(subscriber)
        .expect("error setting global tracing subscriber");

    writer_guard
}

/// Run an async test body on a multi-thread runtime, with tracing set up.
pub fn ut_harness<F, Fut>(f: F) -> anyhow::Result<()>
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    init_default_ut_tracing();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(8)
        .enable_all()
        .build()
        .expect("Failed building the Runtime");

    let res = rt.block_on(f());
    if let Err(e) = &res {
        tracing::error!("test failed: {:?}", e);
    }
    res
}

/// A cluster of nodes talking through a [`DirectNetwork`], each with a
/// [`MemStorage`] and a [`MemStateMachine`].
///
/// The storage of a node survives a stop and is reused when the node is
/// started again. The state machine does not: a restarted node gets a fresh
/// one, as a process that crashed would.
pub struct TypedCluster {
    pub config: Arc<Config>,
    pub members: BTreeSet<NodeId>,
    pub network: DirectNetwork<Cmd>,

    storages: BTreeMap<NodeId, MemStorage<Cmd>>,
    state_machines: BTreeMap<NodeId, MemStateMachine>,
}

impl TypedCluster {
    pub fn new(config: Arc<Config>, members: BTreeSet<NodeId>) -> Self {
        Self {
            config,
            members,
            network: DirectNetwork::default(),
            storages: BTreeMap::new(),
            state_machines: BTreeMap::new(),
        }
    }

    /// The storage of a node, created on first use.
    pub fn storage(&mut self, id: NodeId) -> MemStorage<Cmd> {
        self.storages.entry(id).or_default().clone()
    }

    /// Start a node on its storage, with a fresh state machine.
    pub async fn start(&mut self, id: NodeId) -> anyhow::Result<Raft<Cmd>> {
        tracing::info!("--- start node {}", id);

        let storage = self.storage(id);
        let sm = MemStateMachine::default();

        let raft = Raft::new(
            id,
            self.config.clone(),
            self.members.clone(),
            self.network.for_node(id),
            storage,
            sm.clone(),
        )
        .await?;

        self.network.add_peer(id, raft.clone());
        self.state_machines.insert(id, sm);
        Ok(raft)
    }

    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        let ids = self.members.clone();
        for id in ids {
            self.start(id).await?;
        }
        Ok(())
    }

    /// Shut a node down and unregister it from the network.
    pub async fn stop(&mut self, id: NodeId) -> anyhow::Result<()> {
        tracing::info!("--- stop node {}", id);

        let raft = self
            .network
            .remove_peer(id)
            .with_context(|| format!("node {} is not running", id))?;
        raft.shutdown().await?;
        Ok(())
    }

    pub fn raft(&self, id: NodeId) -> anyhow::Result<Raft<Cmd>> {
        self.network
            .get_peer(&id)
            .with_context(|| format!("node {} is not running", id))
    }

    pub fn state_machine(&self, id: NodeId) -> anyhow::Result<MemStateMachine> {
        self.state_machines
            .get(&id)
            .cloned()
            .with_context(|| format!("node {} is never started", id))
    }

    pub fn metrics(&self, id: NodeId) -> anyhow::Result<Metrics> {
        let rx = self.raft(id)?.metrics();
        let m = rx.borrow().clone();
        Ok(m)
    }

    pub fn wait(
        &self,
        id: NodeId,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Wait> {
        Ok(self.raft(id)?.wait(timeout))
    }

    /// Wait until one of `among` is the leader and all of `among` agree on
    /// it and its term.
    pub async fn wait_for_leader(
        &self,
        among: &BTreeSet<NodeId>,
        timeout: Option<Duration>,
        msg: &str,
    ) -> anyhow::Result<NodeId> {
        let timeout = timeout.unwrap_or(Duration::from_secs(10));
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(leader) = self.agreed_leader(among)? {
                tracing::info!("--- {}: leader is {}", msg, leader);
                return Ok(leader);
            }

            if Instant::now() >= deadline {
                let metrics = among
                    .iter()
                    .map(|id| self.metrics(*id).map(|m| m.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                anyhow::bail!(
                    "timeout after {:?} when {}: no leader among {:?}: {:?}",
                    timeout,
                    msg,
                    among,
                    metrics
                );
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn agreed_leader(
        &self,
        among: &BTreeSet<NodeId>,
    ) -> anyhow::Result<Option<NodeId>> {
        let metrics = among
            .iter()
            .map(|id| self.metrics(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(leader) =
            metrics.iter().find(|m| m.server_state == ServerState::Leader)
        else {
            return Ok(None);
        };

        let agreed = metrics.iter().all(|m| {
            m.current_leader == Some(leader.id)
                && m.current_term == leader.current_term
        });

        Ok(agreed.then_some(leader.id))
    }

    /// Submit a command to a node that is expected to be the leader.
    pub async fn submit(&self, id: NodeId, cmd: Cmd) -> anyhow::Result<LogId> {
        let res = self.raft(id)?.submit(cmd).await?;
        let log_id = res?;
        Ok(log_id)
    }

    /// Submit `n` commands setting `<prefix>-<i>` to `i`.
    ///
    /// Returns the log id of the last one.
    pub async fn submit_many(
        &self,
        id: NodeId,
        prefix: &str,
        n: u64,
    ) -> anyhow::Result<LogId> {
        let mut last = None;
        for i in 0..n {
            let cmd = Cmd::set(format!("{}-{}", prefix, i), i);
            last = Some(self.submit(id, cmd).await?);
        }
        last.context("no command is submitted")
    }

    /// Wait until every node in `ids` has applied `index`.
    pub async fn wait_applied(
        &self,
        ids: &BTreeSet<NodeId>,
        index: u64,
        timeout: Option<Duration>,
        msg: &str,
    ) -> anyhow::Result<()> {
        for id in ids.iter() {
            self.wait(*id, timeout)?
                .applied_index_at_least(index, format!("n{}: {}", id, msg))
                .await?;
        }
        Ok(())
    }

    /// Compact the log of a node up to what its state machine has applied.
    pub async fn snapshot(&self, id: NodeId) -> anyhow::Result<u64> {
        let (index, data) = self.state_machine(id)?.build_snapshot()?;
        self.raft(id)?.snapshot(index, data).await??;
        Ok(index)
    }
}

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::Config;
use crate::core::apply::ApplyItem;
use crate::core::apply::ApplyQueue;
use crate::errors::Fatal;
use crate::errors::ForwardToLeader;
use crate::errors::SnapshotRejected;
use crate::metrics::Metrics;
use crate::metrics::ServerState;
use crate::storage::log::entry::Entry;
use crate::storage::log::log_id::LogId;
use crate::storage::log::LogStore;
use crate::storage::PersistentState;
use crate::storage::RaftStorage;
use crate::storage::Snapshot;
use crate::AppData;
use crate::NodeId;

/// Replication progress of one peer, kept by the leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    /// The next log index to send.
    pub(crate) next_index: u64,

    /// The highest log index known to be replicated on the peer.
    pub(crate) match_index: u64,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{next:{}, match:{}}}", self.next_index, self.match_index)
    }
}

/// All the state of a node, guarded by one lock.
///
/// Every method runs inside a short critical section: it reads and mutates
/// the state, saves it through [`RaftStorage`] when a durable field changed,
/// and returns. None of them waits on the network, a timer or the state
/// machine.
///
/// `last_applied <= commit_index <= last_log_index` always holds.
pub(crate) struct RaftState<D>
where D: AppData
{
    pub(crate) id: NodeId,
    pub(crate) config: Arc<Config>,

    /// The fixed cluster members, including this node.
    pub(crate) members: BTreeSet<NodeId>,

    pub(crate) persistent: PersistentState<D>,
    storage: Box<dyn RaftStorage<D>>,

    pub(crate) server_state: ServerState,
    pub(crate) leader_id: Option<NodeId>,

    pub(crate) commit_index: u64,

    /// Written only by the apply worker.
    pub(crate) last_applied: u64,

    /// Entries up to this index have been handed to the apply queue.
    pub(crate) queued_index: u64,

    pub(crate) election_deadline: Instant,

    /// Per-peer progress. Non-empty only on a leader.
    pub(crate) progress: BTreeMap<NodeId, Progress>,

    /// The latest snapshot, sent to followers that lag behind the log.
    pub(crate) snapshot: Option<Snapshot>,

    /// A snapshot waiting for room in the apply queue.
    pub(crate) pending_snapshot: Option<Snapshot>,

    pub(crate) running: Result<(), Fatal>,
}

impl<D> fmt::Display for RaftState<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RaftState{{id:{}, {}, {}, committed:{}, applied:{}}}",
            self.id,
            self.server_state,
            self.persistent,
            self.commit_index,
            self.last_applied
        )
    }
}

impl<D> RaftState<D>
where D: AppData
{
    /// Restore the state from `storage`.
    ///
    /// The commit index restarts at the snapshot: entries after it are
    /// delivered again once a leader commits them in this run.
    pub(crate) fn load(
        id: NodeId,
        config: Arc<Config>,
        members: BTreeSet<NodeId>,
        mut storage: Box<dyn RaftStorage<D>>,
    ) -> Result<Self, Fatal> {
        let mut persistent = storage.load_state()?.unwrap_or_default();
        let snapshot = storage.load_snapshot()?;

        if !members.contains(&id) {
            warn!(id, "node is not a member of {:?}", members);
        }

        let mut compacted = false;
        if let Some(snap) = &snapshot {
            // Crashed between saving the snapshot and the compacted log.
            if persistent.log.snapshot_index() < snap.last_included().index {
                persistent.log.compact(snap.last_included());
                compacted = true;
            }
        }

        let snapshot_index = persistent.log.snapshot_index();
        if snapshot_index > 0 && snapshot.is_none() {
            warn!(
                id,
                snapshot_index, "log is compacted but no snapshot is found"
            );
        }

        let deadline = Instant::now() + config.new_rand_election_timeout();

        let mut st = Self {
            id,
            config,
            members,
            persistent,
            storage,
            server_state: ServerState::Follower,
            leader_id: None,
            commit_index: snapshot_index,
            last_applied: 0,
            queued_index: snapshot_index,
            election_deadline: deadline,
            progress: BTreeMap::new(),
            snapshot: snapshot.clone(),
            pending_snapshot: snapshot,
            running: Ok(()),
        };

        if compacted {
            st.persist()?;
        }

        info!(id, state = display(&st.persistent), "loaded");

        Ok(st)
    }

    pub(crate) fn current_term(&self) -> u64 {
        self.persistent.current_term
    }

    pub(crate) fn log(&self) -> &LogStore<D> {
        &self.persistent.log
    }

    pub(crate) fn is_leader(&self) -> bool {
        self.server_state == ServerState::Leader
    }

    /// Returns `true` if a task launched for `(state, term)` is still valid.
    pub(crate) fn is_at(&self, state: ServerState, term: u64) -> bool {
        self.running.is_ok()
            && self.server_state == state
            && self.current_term() == term
    }

    /// The other members of the cluster.
    pub(crate) fn peers(&self) -> Vec<NodeId> {
        self.members.iter().copied().filter(|x| *x != self.id).collect()
    }

    pub(crate) fn reset_election_deadline(&mut self) {
        self.election_deadline =
            Instant::now() + self.config.new_rand_election_timeout();
    }

    /// Durably save term, vote and log.
    pub(crate) fn persist(&mut self) -> Result<(), Fatal> {
        self.storage.save_state(&self.persistent).map_err(|e| {
            error!(id = self.id, error = display(&e), "failed to save state");
            Fatal::from(e)
        })
    }

    /// Adopt a greater term seen in any request or reply.
    ///
    /// The vote is cleared and the node reverts to follower. Returns `true` if
    /// the term is updated.
    pub(crate) fn update_term(&mut self, term: u64) -> Result<bool, Fatal> {
        if term <= self.current_term() {
            return Ok(false);
        }

        info!(
            id = self.id,
            from = self.current_term(),
            to = term,
            "see higher term, revert to follower"
        );

        self.persistent.current_term = term;
        self.persistent.voted_for = None;
        self.leader_id = None;
        self.become_follower();
        self.persist()?;
        Ok(true)
    }

    pub(crate) fn become_follower(&mut self) {
        if self.server_state != ServerState::Follower {
            debug!(id = self.id, from = display(self.server_state), "become follower");
        }
        self.server_state = ServerState::Follower;
        self.progress.clear();
    }

    /// Accept `leader_id` as the leader of `term`, which must not be stale.
    pub(crate) fn accept_leader(
        &mut self,
        term: u64,
        leader_id: NodeId,
    ) -> Result<(), Fatal> {
        debug_assert!(term >= self.current_term());

        self.update_term(term)?;
        self.become_follower();
        self.leader_id = Some(leader_id);
        self.reset_election_deadline();
        Ok(())
    }

    /// Append a command to the log of a leader.
    pub(crate) fn submit(
        &mut self,
        data: D,
    ) -> Result<Result<LogId, ForwardToLeader>, Fatal> {
        if !self.is_leader() {
            return Ok(Err(ForwardToLeader {
                leader_id: self.leader_id,
            }));
        }

        let log_id =
            LogId::new(self.current_term(), self.log().last_index() + 1);
        self.persistent.log.append(Entry::new_normal(log_id, data));
        self.persist()?;
        self.advance_leader_commit();

        debug!(id = self.id, log_id = display(log_id), "submitted");

        Ok(Ok(log_id))
    }

    /// Replace the log prefix up to `index` with a snapshot built by the
    /// application.
    pub(crate) fn build_snapshot(
        &mut self,
        index: u64,
        data: Vec<u8>,
    ) -> Result<Result<(), SnapshotRejected>, Fatal> {
        if let Some(snapshot_last) = self.log().snapshot_last() {
            if index <= snapshot_last.index {
                return Ok(Err(SnapshotRejected::Stale {
                    index,
                    snapshot_last,
                }));
            }
        }

        let term = match self.log().term_at(index) {
            Some(term) if index > 0 && index <= self.last_applied => term,
            _ => {
                return Ok(Err(SnapshotRejected::NotApplied {
                    index,
                    last_applied: self.last_applied,
                }));
            }
        };

        let snapshot = Snapshot::new(LogId::new(term, index), data);
        self.save_snapshot(snapshot)?;

        info!(id = self.id, index, "built snapshot");
        Ok(Ok(()))
    }

    /// Save `snapshot` then the log compacted up to it.
    pub(crate) fn save_snapshot(
        &mut self,
        snapshot: Snapshot,
    ) -> Result<(), Fatal> {
        self.storage.save_snapshot(&snapshot).map_err(|e| {
            error!(id = self.id, error = display(&e), "failed to save snapshot");
            Fatal::from(e)
        })?;

        self.persistent.log.compact(snapshot.last_included());
        self.persist()?;

        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Move committed entries that are not yet queued to the apply queue, as
    /// many as it has room for. A pending snapshot always goes first.
    pub(crate) fn fill_apply_queue(&mut self, queue: &ApplyQueue<D>) {
        if self.pending_snapshot.is_none()
            && self.queued_index >= self.commit_index
        {
            return;
        }

        queue.fill(|vacancy| {
            let mut items = Vec::new();

            if let Some(snapshot) = self.pending_snapshot.take() {
                items.push(ApplyItem::Snapshot(snapshot));
            }

            while items.len() < vacancy && self.queued_index < self.commit_index
            {
                let Some(entry) = self.persistent.log.get(self.queued_index + 1)
                else {
                    warn!(
                        id = self.id,
                        index = self.queued_index + 1,
                        "committed entry is compacted before being applied"
                    );
                    break;
                };
                items.push(ApplyItem::Entry(entry.clone()));
                self.queued_index += 1;
            }

            items
        });
    }

    pub(crate) fn metrics(&self) -> Metrics {
        Metrics {
            running_state: self.running.clone(),
            id: self.id,
            current_term: self.current_term(),
            voted_for: self.persistent.voted_for,
            server_state: self.server_state,
            current_leader: self.leader_id,
            last_log_index: self.log().last_index(),
            commit_index: self.commit_index,
            last_applied: self.last_applied,
            snapshot: self.log().snapshot_last(),
        }
    }
}

//! The election engine: the election timer and the vote-collecting round
//! of a candidate.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::core::raft_state::Progress;
use crate::core::raft_state::RaftState;
use crate::core::shared::Shared;
use crate::errors::Fatal;
use crate::metrics::ServerState;
use crate::network::Connection;
use crate::quorum::QuorumSet;
use crate::raft::RequestVote;
use crate::raft::VoteReply;
use crate::storage::log::entry::Entry;
use crate::AppData;
use crate::LogId;
use crate::Network;
use crate::NodeId;

impl<D> RaftState<D>
where D: AppData
{
    /// Called when the election timer fires.
    ///
    /// An election starts only if the deadline has not been pushed back by a
    /// leader message or a granted vote in the meantime.
    pub(crate) fn election_timeout(
        &mut self,
        now: Instant,
        enable_elect: bool,
    ) -> Result<(), Fatal> {
        if now < self.election_deadline {
            return Ok(());
        }

        if self.is_leader() || !enable_elect {
            self.reset_election_deadline();
            return Ok(());
        }

        self.start_election()
    }

    /// Increase the term, vote for self and become candidate.
    ///
    /// A single-node cluster wins at once.
    pub(crate) fn start_election(&mut self) -> Result<(), Fatal> {
        self.persistent.current_term += 1;
        self.persistent.voted_for = Some(self.id);
        self.server_state = ServerState::Candidate;
        self.leader_id = None;
        self.progress.clear();
        self.reset_election_deadline();
        self.persist()?;

        info!(
            id = self.id,
            term = self.current_term(),
            last_log = debug(self.log().last_log_id()),
            "start election"
        );

        if self.members.is_quorum([self.id].iter()) {
            self.become_leader()?;
        }
        Ok(())
    }

    pub(crate) fn vote_request(&self) -> RequestVote {
        RequestVote::new(
            self.current_term(),
            self.id,
            self.log().last_log_id(),
        )
    }

    /// Count a vote reply of an election round launched for `term`.
    ///
    /// Returns `true` if the round is over.
    pub(crate) fn handle_vote_reply(
        &mut self,
        term: u64,
        granted: &mut BTreeSet<NodeId>,
        target: NodeId,
        reply: VoteReply,
    ) -> Result<bool, Fatal> {
        if self.update_term(reply.term)? {
            return Ok(true);
        }

        if !self.is_at(ServerState::Candidate, term) {
            return Ok(true);
        }

        if !reply.vote_granted {
            return Ok(false);
        }

        granted.insert(target);
        debug!(id = self.id, term, granted = debug(&granted), "vote granted");

        if self.members.is_quorum(granted.iter()) {
            self.become_leader()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Initialize the progress of every peer and append a blank entry of the
    /// new term, so that entries of previous terms can be committed.
    pub(crate) fn become_leader(&mut self) -> Result<(), Fatal> {
        let next_index = self.log().last_index() + 1;

        self.server_state = ServerState::Leader;
        self.leader_id = Some(self.id);
        self.progress = self
            .peers()
            .into_iter()
            .map(|id| {
                (id, Progress {
                    next_index,
                    match_index: 0,
                })
            })
            .collect();

        let log_id = LogId::new(self.current_term(), next_index);
        self.persistent.log.append(Entry::new_blank(log_id));
        self.persist()?;
        self.advance_leader_commit();

        info!(id = self.id, term = self.current_term(), "become leader");
        Ok(())
    }
}

/// Fires when the election deadline passes and starts an election if it
/// has not been pushed back.
pub(crate) async fn run_election_timer<D>(shared: Arc<Shared<D>>)
where D: AppData {
    let mut rx_shutdown = shared.subscribe_shutdown();

    loop {
        let Ok(deadline) = shared.with_state(|st| Ok(st.election_deadline))
        else {
            break;
        };

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = rx_shutdown.changed() => break,
        }

        let enable_elect =
            shared.runtime_config.enable_elect.load(Ordering::Relaxed);

        let res = shared
            .with_state(|st| st.election_timeout(Instant::now(), enable_elect));
        if res.is_err() {
            break;
        }
    }

    debug!(id = shared.id, "election timer quit");
}

/// Collect votes for the candidate of `term`.
///
/// The round ends when the candidate wins, sees a greater term, is no longer
/// the candidate of `term`, or every peer has replied or timed out. A lost
/// round is never retried: the next election timeout starts a new one.
pub(crate) async fn run_election_round<D, N>(
    shared: Arc<Shared<D>>,
    mut network: N,
    term: u64,
) where
    D: AppData,
    N: Network<D>,
{
    let res = shared.with_state(|st| {
        if st.is_at(ServerState::Candidate, term) {
            Ok(Some((st.vote_request(), st.peers())))
        } else {
            Ok(None)
        }
    });

    let Ok(Some((req, peers))) = res else {
        return;
    };

    let timeout = shared.config.rpc_timeout();
    let mut pending = FuturesUnordered::new();

    for target in peers {
        let mut conn = network.new_connection(target).await;
        let req = req.clone();

        pending.push(async move {
            let res =
                tokio::time::timeout(timeout, conn.request_vote(req)).await;
            (target, res)
        });
    }

    let mut granted = BTreeSet::from([shared.id]);

    while let Some((target, res)) = pending.next().await {
        let reply = match res {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                debug!(id = shared.id, target, error = display(&e), "request_vote");
                continue;
            }
            Err(_elapsed) => {
                debug!(id = shared.id, target, "request_vote timeout");
                continue;
            }
        };

        debug!(id = shared.id, target, reply = display(&reply), "vote reply");

        let res = shared.with_state(|st| {
            st.handle_vote_reply(term, &mut granted, target, reply)
        });

        match res {
            Ok(false) => {}
            Ok(true) | Err(_) => return,
        }
    }

    debug!(id = shared.id, term, "election round finished without quorum");
}

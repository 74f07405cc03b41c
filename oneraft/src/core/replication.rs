//! The replication engine: one session per peer while this node is the
//! leader of a term, and the commit-index advancement it feeds.

use std::cmp::max;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::core::raft_state::RaftState;
use crate::core::shared::Shared;
use crate::errors::Fatal;
use crate::errors::NetworkError;
use crate::metrics::ServerState;
use crate::network::Connection;
use crate::quorum::QuorumSet;
use crate::raft::AppendEntries;
use crate::raft::AppendEntriesReply;
use crate::raft::InstallSnapshot;
use crate::raft::InstallSnapshotReply;
use crate::AppData;
use crate::LogId;
use crate::LogIdOptionExt;
use crate::Network;
use crate::NodeId;

/// The next request a session sends.
pub(crate) enum Replicate<D>
where D: AppData
{
    /// The session is no longer valid.
    Stop,

    /// Nothing to send now.
    Idle,

    Append(AppendEntries<D>),

    Snapshot(InstallSnapshot),
}

/// What a session does after handling a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Next {
    Stop,

    /// Send the next request at once.
    Resend,

    /// Wait for the next heartbeat or a new entry.
    Wait,
}

/// What has been sent, to interpret the reply.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Sent {
    Append { prev_index: u64, last_index: u64 },
    Snapshot { last_included: LogId },
}

pub(crate) enum Reply {
    Append(AppendEntriesReply),
    Snapshot(InstallSnapshotReply),
}

impl<D> RaftState<D>
where D: AppData
{
    /// Build the next request for `target` of a session of `term`.
    ///
    /// An empty AppendEntries is built only if `heartbeat` is `true`. The
    /// snapshot is sent instead when the entry right before `next_index` has
    /// been compacted.
    pub(crate) fn replicate_to(
        &self,
        target: NodeId,
        term: u64,
        heartbeat: bool,
    ) -> Replicate<D> {
        if !self.is_at(ServerState::Leader, term) {
            return Replicate::Stop;
        }

        let Some(progress) = self.progress.get(&target) else {
            return Replicate::Stop;
        };

        let log = self.log();
        let prev_index = progress.next_index - 1;

        let Some(prev_term) = log.term_at(prev_index) else {
            return match &self.snapshot {
                Some(snapshot) => Replicate::Snapshot(InstallSnapshot {
                    term,
                    leader_id: self.id,
                    snapshot: snapshot.clone(),
                }),
                None => {
                    warn!(
                        id = self.id,
                        target, prev_index, "no log and no snapshot to send"
                    );
                    Replicate::Idle
                }
            };
        };

        let entries = log
            .entries_from(progress.next_index, self.config.max_payload_entries);

        if entries.is_empty() && !heartbeat {
            return Replicate::Idle;
        }

        let prev_log_id = if prev_index == 0 {
            None
        } else {
            Some(LogId::new(prev_term, prev_index))
        };

        Replicate::Append(AppendEntries {
            term,
            leader_id: self.id,
            prev_log_id,
            entries,
            leader_commit: self.commit_index,
        })
    }

    /// Update the progress of `target` with a reply to a request sent by a
    /// session of `term`.
    pub(crate) fn handle_replication_reply(
        &mut self,
        target: NodeId,
        term: u64,
        sent: Sent,
        reply: Reply,
    ) -> Result<Next, Fatal> {
        let reply_term = match &reply {
            Reply::Append(r) => r.term,
            Reply::Snapshot(r) => r.term,
        };

        if self.update_term(reply_term)? {
            return Ok(Next::Stop);
        }

        if !self.is_at(ServerState::Leader, term) {
            return Ok(Next::Stop);
        }

        let last_log_index = self.log().last_index();
        let id = self.id;

        let Some(progress) = self.progress.get_mut(&target) else {
            return Ok(Next::Stop);
        };

        let acked = match (sent, reply) {
            (Sent::Append { last_index, .. }, Reply::Append(r)) if r.success => {
                last_index
            }
            (Sent::Snapshot { last_included }, Reply::Snapshot(_)) => {
                last_included.index
            }
            (Sent::Append { prev_index, .. }, Reply::Append(r)) => {
                let Some(hint) = r.conflict else {
                    return Ok(Next::Wait);
                };

                let lower = progress.match_index + 1;
                let next_index = match hint.term {
                    Some(t) => {
                        let n = self
                            .persistent
                            .log
                            .last_index_of_term(t)
                            .map(|i| i + 1)
                            .unwrap_or(hint.index);
                        n.clamp(lower, max(lower, prev_index))
                    }
                    None => {
                        hint.index.clamp(lower, max(lower, last_log_index + 1))
                    }
                };

                debug!(
                    id,
                    target,
                    hint = display(hint),
                    next_index,
                    "conflict, backtrack"
                );

                progress.next_index = next_index;
                return Ok(Next::Resend);
            }
            _ => {
                warn!(id, target, "reply does not match the request");
                return Ok(Next::Wait);
            }
        };

        progress.match_index = max(progress.match_index, acked);
        progress.next_index = progress.match_index + 1;

        debug!(id, target, progress = display(*progress), "replicated");

        let backlog = progress.next_index <= last_log_index;

        self.advance_leader_commit();

        Ok(if backlog { Next::Resend } else { Next::Wait })
    }

    /// Raise the commit index to the greatest index replicated on a quorum,
    /// if the entry there is of the current term.
    pub(crate) fn advance_leader_commit(&mut self) {
        if !self.is_leader() {
            return;
        }

        let last_index = self.log().last_index();
        let agreed = self.members.quorum_accepted(|id| {
            if *id == self.id {
                last_index
            } else {
                self.progress.get(id).map(|p| p.match_index).unwrap_or_default()
            }
        });

        if agreed <= self.commit_index {
            return;
        }

        // Entries of a previous term are committed only indirectly.
        if self.log().term_at(agreed) != Some(self.current_term()) {
            return;
        }

        debug!(id = self.id, from = self.commit_index, to = agreed, "commit");
        self.commit_index = agreed;
    }
}

type InFlight<C> = BoxFuture<
    'static,
    (C, Sent, Result<Result<Reply, NetworkError>, tokio::time::error::Elapsed>),
>;

/// Replicate the log to `target` while this node is the leader of `term`.
///
/// The session waits for whichever comes first: the heartbeat timer, a new
/// entry appended to the log, or the reply to the in-flight request. Only one
/// request is in flight at a time. It quits on its own once the node is no
/// longer the leader of `term`.
pub(crate) async fn run_replication<D, N>(
    shared: Arc<Shared<D>>,
    mut network: N,
    target: NodeId,
    term: u64,
) where
    D: AppData,
    N: Network<D>,
{
    let id = shared.id;
    let heartbeat_interval = shared.config.heartbeat_interval();
    let timeout = shared.config.rpc_timeout();

    let mut rx_appended = shared.subscribe_appended();
    let mut rx_shutdown = shared.subscribe_shutdown();

    let mut conn = Some(network.new_connection(target).await);
    let mut in_flight: Option<InFlight<N::Connection>> = None;

    // Assert leadership at once.
    let mut send_now = true;
    let mut heartbeat = true;
    let mut next_heartbeat = Instant::now() + heartbeat_interval;

    loop {
        if send_now && in_flight.is_none() {
            send_now = false;

            let res = shared
                .with_state(|st| Ok(st.replicate_to(target, term, heartbeat)));
            heartbeat = false;

            let replicate = match res {
                Ok(x) => x,
                Err(_) => break,
            };

            let Some(mut c) = conn.take() else {
                break;
            };

            in_flight = match replicate {
                Replicate::Stop => break,
                Replicate::Idle => {
                    conn = Some(c);
                    None
                }
                Replicate::Append(rpc) => {
                    let prev_index = rpc.prev_log_id.index();
                    let last_index = rpc
                        .entries
                        .last()
                        .map(|e| e.index())
                        .unwrap_or(prev_index);
                    let sent = Sent::Append {
                        prev_index,
                        last_index,
                    };
                    debug!(id, target, rpc = display(&rpc), "send append_entries");

                    let fu = async move {
                        let res = tokio::time::timeout(
                            timeout,
                            c.append_entries(rpc),
                        )
                        .await
                        .map(|r| r.map(Reply::Append));
                        (c, sent, res)
                    };
                    Some(fu.boxed())
                }
                Replicate::Snapshot(rpc) => {
                    let sent = Sent::Snapshot {
                        last_included: rpc.snapshot.last_included(),
                    };
                    debug!(id, target, rpc = display(&rpc), "send install_snapshot");

                    let fu = async move {
                        let res = tokio::time::timeout(
                            timeout,
                            c.install_snapshot(rpc),
                        )
                        .await
                        .map(|r| r.map(Reply::Snapshot));
                        (c, sent, res)
                    };
                    Some(fu.boxed())
                }
            };

            next_heartbeat = Instant::now() + heartbeat_interval;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(next_heartbeat), if in_flight.is_none() => {
                heartbeat = shared.runtime_config.enable_heartbeat.load(Ordering::Relaxed);
                send_now = true;
                // Without heartbeat, only check the backlog and validity.
                next_heartbeat = Instant::now() + heartbeat_interval;
            }
            changed = rx_appended.changed(), if in_flight.is_none() => {
                if changed.is_err() {
                    break;
                }
                send_now = true;
            }
            (c, sent, res) = poll_in_flight(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                conn = Some(c);

                let reply = match res {
                    Ok(Ok(reply)) => reply,
                    Ok(Err(e)) => {
                        debug!(id, target, error = display(&e), "replication failed, retry at next heartbeat");
                        continue;
                    }
                    Err(_elapsed) => {
                        debug!(id, target, "replication timeout, retry at next heartbeat");
                        continue;
                    }
                };

                let res = shared.with_state(|st| {
                    st.handle_replication_reply(target, term, sent, reply)
                });

                match res {
                    Ok(Next::Resend) => {
                        send_now = true;
                        heartbeat = true;
                    }
                    Ok(Next::Wait) => {}
                    Ok(Next::Stop) | Err(_) => break,
                }
            }
            _ = rx_shutdown.changed() => break,
        }
    }

    debug!(id, target, term, "replication session quit");
}

async fn poll_in_flight<T>(in_flight: &mut Option<BoxFuture<'static, T>>) -> T {
    match in_flight {
        Some(fu) => fu.await,
        None => futures::future::pending().await,
    }
}

//! Handlers of inbound RPCs.
//!
//! Each handler is a state transition over [`RaftState`], run by the caller
//! inside one critical section. Whatever the reply depends on is persisted
//! before the handler returns it.

use std::cmp::max;
use std::cmp::min;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::raft_state::RaftState;
use crate::errors::Fatal;
use crate::raft::AppendEntries;
use crate::raft::AppendEntriesReply;
use crate::raft::ConflictHint;
use crate::raft::InstallSnapshot;
use crate::raft::InstallSnapshotReply;
use crate::raft::RequestVote;
use crate::raft::VoteReply;
use crate::AppData;
use crate::LogIdOptionExt;

impl<D> RaftState<D>
where D: AppData
{
    /// Grant the vote iff the candidate's term is not stale, this node has not
    /// voted for another candidate in this term, and the candidate's log is
    /// at least as up-to-date as this node's log.
    pub(crate) fn handle_request_vote(
        &mut self,
        req: RequestVote,
    ) -> Result<VoteReply, Fatal> {
        debug!(id = self.id, req = display(&req), "handle_request_vote");

        if req.term < self.current_term() {
            return Ok(VoteReply::new(self.current_term(), false));
        }

        self.update_term(req.term)?;

        let can_vote = match self.persistent.voted_for {
            None => true,
            Some(voted) => voted == req.candidate_id,
        };

        let up_to_date = req.last_log_id >= self.log().last_log_id();

        if !(can_vote && up_to_date) {
            debug!(
                id = self.id,
                voted_for = debug(self.persistent.voted_for),
                up_to_date,
                "reject vote for {}",
                req.candidate_id
            );
            return Ok(VoteReply::new(self.current_term(), false));
        }

        if self.persistent.voted_for != Some(req.candidate_id) {
            self.persistent.voted_for = Some(req.candidate_id);
            self.persist()?;
        }
        self.reset_election_deadline();

        info!(
            id = self.id,
            term = self.current_term(),
            "granted vote to {}",
            req.candidate_id
        );

        Ok(VoteReply::new(self.current_term(), true))
    }

    pub(crate) fn handle_append_entries(
        &mut self,
        req: AppendEntries<D>,
    ) -> Result<AppendEntriesReply, Fatal> {
        debug!(id = self.id, req = display(&req), "handle_append_entries");

        if req.term < self.current_term() {
            return Ok(AppendEntriesReply::stale(self.current_term()));
        }

        self.accept_leader(req.term, req.leader_id)?;

        let term = self.current_term();
        let prev_index = req.prev_log_id.index();
        let log = self.log();

        if prev_index < log.snapshot_index() {
            // Everything up to the snapshot is committed; resume after it.
            let hint = ConflictHint {
                term: None,
                index: log.snapshot_index() + 1,
            };
            debug!(id = self.id, hint = display(hint), "prev log is compacted");
            return Ok(AppendEntriesReply::conflict(term, hint));
        }

        match log.term_at(prev_index) {
            None => {
                let hint = ConflictHint {
                    term: None,
                    index: log.last_index() + 1,
                };
                debug!(id = self.id, hint = display(hint), "prev log not found");
                return Ok(AppendEntriesReply::conflict(term, hint));
            }
            Some(t) if t != req.prev_log_id.term() => {
                let hint = ConflictHint {
                    term: Some(t),
                    index: log.first_index_of_term(t, prev_index),
                };
                debug!(id = self.id, hint = display(hint), "prev log conflicts");
                return Ok(AppendEntriesReply::conflict(term, hint));
            }
            Some(_) => {}
        }

        let last_new_index = prev_index + req.entries.len() as u64;
        let mut changed = false;

        for entry in req.entries {
            match self.log().term_at(entry.index()) {
                Some(t) if t == entry.term() => continue,
                Some(_) => {
                    if entry.index() <= self.commit_index {
                        warn!(
                            id = self.id,
                            index = entry.index(),
                            commit_index = self.commit_index,
                            "truncating committed log"
                        );
                    }
                    debug!(id = self.id, "truncate log from {}", entry.index());
                    self.persistent.log.truncate_from(entry.index());
                }
                None => {}
            }

            self.persistent.log.append(entry);
            changed = true;
        }

        if changed {
            self.persist()?;
        }

        if req.leader_commit > self.commit_index {
            let commit_index = min(req.leader_commit, last_new_index);
            self.commit_index = max(self.commit_index, commit_index);
        }

        Ok(AppendEntriesReply::success(term))
    }

    pub(crate) fn handle_install_snapshot(
        &mut self,
        req: InstallSnapshot,
    ) -> Result<InstallSnapshotReply, Fatal> {
        debug!(id = self.id, req = display(&req), "handle_install_snapshot");

        if req.term < self.current_term() {
            return Ok(InstallSnapshotReply {
                term: self.current_term(),
            });
        }

        self.accept_leader(req.term, req.leader_id)?;

        let last_included = req.snapshot.last_included();
        if last_included.index <= self.commit_index {
            debug!(
                id = self.id,
                commit_index = self.commit_index,
                "snapshot {} is already committed",
                last_included
            );
            return Ok(InstallSnapshotReply {
                term: self.current_term(),
            });
        }

        self.save_snapshot(req.snapshot.clone())?;

        self.commit_index = last_included.index;
        self.queued_index = max(self.queued_index, last_included.index);
        self.pending_snapshot = Some(req.snapshot);

        info!(
            id = self.id,
            snapshot = display(last_included),
            "installed snapshot"
        );

        Ok(InstallSnapshotReply {
            term: self.current_term(),
        })
    }
}

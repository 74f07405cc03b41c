use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::info;
use tracing::Instrument;

use crate::core::election::run_election_round;
use crate::core::replication::run_replication;
use crate::core::shared::Shared;
use crate::core::transition::Transition;
use crate::metrics::ServerState;
use crate::AppData;
use crate::Network;

/// Starts the tasks of a new `(role, term)`.
///
/// A candidate gets one election round, a leader one replication session
/// per peer. The dispatcher never stops a task: each of them quits on its own
/// once it finds the role or term changed.
pub(crate) struct Dispatcher<D, N>
where
    D: AppData,
    N: Network<D>,
{
    pub(crate) shared: Arc<Shared<D>>,
    pub(crate) network: N,
    pub(crate) rx_transition: mpsc::UnboundedReceiver<Transition>,
    pub(crate) tasks: JoinSet<()>,
}

impl<D, N> Dispatcher<D, N>
where
    D: AppData,
    N: Network<D>,
{
    pub(crate) async fn main(mut self) {
        let mut rx_shutdown = self.shared.subscribe_shutdown();

        loop {
            tokio::select! {
                transition = self.rx_transition.recv() => {
                    let Some(transition) = transition else {
                        break;
                    };
                    self.dispatch(transition);
                }
                Some(res) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = res {
                        if e.is_panic() {
                            tracing::error!(id = self.shared.id, error = display(&e), "task panicked");
                        }
                    }
                }
                _ = rx_shutdown.changed() => break,
            }
        }

        // Tasks quit by themselves on shutdown.
        while self.tasks.join_next().await.is_some() {}

        info!(id = self.shared.id, "dispatcher quit");
    }

    fn dispatch(&mut self, transition: Transition) {
        debug!(id = self.shared.id, transition = display(transition), "dispatch");

        let term = transition.term;

        match transition.server_state {
            ServerState::Follower => {}
            ServerState::Candidate => {
                let fu = run_election_round(
                    self.shared.clone(),
                    self.network.clone(),
                    term,
                );
                self.tasks.spawn(fu.in_current_span());
            }
            ServerState::Leader => {
                let peers = self.shared.members.iter().copied();
                for target in peers.filter(|x| *x != self.shared.id) {
                    let fu = run_replication(
                        self.shared.clone(),
                        self.network.clone(),
                        target,
                        term,
                    );
                    let span = tracing::debug_span!("replication", target);
                    self.tasks.spawn(fu.instrument(span));
                }
            }
        }
    }
}

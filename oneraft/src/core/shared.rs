use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;

use crate::config::Config;
use crate::config::RuntimeConfig;
use crate::core::apply::ApplyQueue;
use crate::core::raft_state::RaftState;
use crate::core::transition::Transition;
use crate::errors::Fatal;
use crate::metrics::Metrics;
use crate::AppData;
use crate::NodeId;

/// What every task of a node shares: the locked state and the channels
/// through which a critical section announces its effects.
pub(crate) struct Shared<D>
where D: AppData
{
    pub(crate) id: NodeId,
    pub(crate) config: Arc<Config>,
    pub(crate) runtime_config: Arc<RuntimeConfig>,

    /// The fixed cluster members, including this node.
    pub(crate) members: BTreeSet<NodeId>,

    state: Mutex<RaftState<D>>,

    pub(crate) apply_queue: ApplyQueue<D>,

    tx_transition: mpsc::UnboundedSender<Transition>,
    tx_metrics: watch::Sender<Metrics>,

    /// The last log index, updated whenever the log grows.
    tx_appended: watch::Sender<u64>,

    tx_shutdown: watch::Sender<bool>,
}

impl<D> Shared<D>
where D: AppData
{
    pub(crate) fn new(
        state: RaftState<D>,
        runtime_config: Arc<RuntimeConfig>,
        tx_transition: mpsc::UnboundedSender<Transition>,
        tx_metrics: watch::Sender<Metrics>,
    ) -> Self {
        let (tx_appended, _) = watch::channel(state.log().last_index());
        let (tx_shutdown, _) = watch::channel(false);

        Self {
            id: state.id,
            config: state.config.clone(),
            runtime_config,
            members: state.members.clone(),
            apply_queue: ApplyQueue::new(
                state.config.apply_queue_capacity as usize,
            ),
            state: Mutex::new(state),
            tx_transition,
            tx_metrics,
            tx_appended,
            tx_shutdown,
        }
    }

    /// Run one critical section.
    ///
    /// After `f` returns, still under the lock: a role or term change is sent
    /// to the dispatcher, replication sessions are woken up if the log grew,
    /// newly committed entries are queued for the state machine and the
    /// metrics are published.
    ///
    /// A [`Fatal`] returned by `f` stops the node: it is recorded, every task
    /// is told to quit and every later call returns it. Metrics then only
    /// change in `running_state`.
    pub(crate) fn with_state<T, F>(&self, f: F) -> Result<T, Fatal>
    where F: FnOnce(&mut RaftState<D>) -> Result<T, Fatal> {
        let mut st = self.state.lock().map_err(|_| Fatal::Panicked)?;
        st.running.clone()?;

        let before = Transition::new(st.server_state, st.current_term());
        let last_index = st.log().last_index();

        let res = f(&mut st);

        match &res {
            Ok(_) => {
                let after = Transition::new(st.server_state, st.current_term());
                if after != before {
                    info!(
                        id = self.id,
                        from = display(before),
                        to = display(after),
                        "transition"
                    );
                    // The receiver is gone only when the node is shutting down
                    let _ = self.tx_transition.send(after);
                }

                let new_last_index = st.log().last_index();
                if new_last_index != last_index {
                    self.tx_appended.send_replace(new_last_index);
                }

                st.fill_apply_queue(&self.apply_queue);

                let metrics = st.metrics();
                self.tx_metrics.send_if_modified(|m| {
                    if *m == metrics {
                        false
                    } else {
                        *m = metrics;
                        true
                    }
                });
            }
            Err(fatal) => {
                if *fatal == Fatal::Stopped {
                    info!(id = self.id, "stopping");
                } else {
                    error!(id = self.id, fatal = display(fatal), "fatal error, stopping");
                }
                st.running = Err(fatal.clone());
                self.tx_shutdown.send_replace(true);

                // `f` may have changed the state without saving it. Only the
                // stop is published; the rest stays as last published.
                self.tx_metrics.send_modify(|m| {
                    m.running_state = Err(fatal.clone());
                });
            }
        }

        res
    }

    pub(crate) fn subscribe_appended(&self) -> watch::Receiver<u64> {
        self.tx_appended.subscribe()
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.tx_shutdown.subscribe()
    }

    /// Stop the node with `Fatal::Stopped`, unless it already stopped.
    pub(crate) fn stop(&self) {
        let _ = self.with_state(|_| Err::<(), _>(Fatal::Stopped));
    }
}

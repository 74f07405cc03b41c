use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::config::RuntimeConfig;
use crate::core::shared::Shared;
use crate::errors::Fatal;
use crate::AppData;
use crate::Metrics;
use crate::NodeId;

/// RaftInner is the internal handle shared by all clones of a
/// [`Raft`](crate::Raft).
pub(in crate::raft) struct RaftInner<D>
where D: AppData
{
    pub(in crate::raft) id: NodeId,
    pub(in crate::raft) config: Arc<Config>,
    pub(in crate::raft) runtime_config: Arc<RuntimeConfig>,
    pub(in crate::raft) shared: Arc<Shared<D>>,
    pub(in crate::raft) rx_metrics: watch::Receiver<Metrics>,

    /// The dispatcher, the election timer and the apply worker.
    pub(in crate::raft) handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<D> RaftInner<D>
where D: AppData
{
    /// Wait for the long-running tasks to finish.
    ///
    /// Only the first caller joins them; later callers return at once.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(in crate::raft) async fn join_tasks(&self) -> Result<(), Fatal> {
        let handles = {
            let mut handles = self.handles.lock().map_err(|_| Fatal::Panicked)?;
            std::mem::take(&mut *handles)
        };

        let mut res = Ok(());

        for h in handles {
            if let Err(e) = h.await {
                tracing::error!(id = self.id, error = display(&e), "task failed");
                if e.is_panic() {
                    res = Err(Fatal::Panicked);
                }
            }
        }

        info!(id = self.id, "all tasks quit");
        res
    }
}

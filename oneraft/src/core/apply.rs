//! The ordered hand-off from committed log to the state machine.

use std::cmp::max;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use tokio::sync::Notify;
use tracing::debug;
use tracing::info;

use crate::core::shared::Shared;
use crate::errors::Fatal;
use crate::storage::log::entry::Entry;
use crate::storage::Snapshot;
use crate::AppData;
use crate::StateMachine;

/// An item to deliver to the state machine.
pub(crate) enum ApplyItem<D>
where D: AppData
{
    Entry(Entry<D>),
    Snapshot(Snapshot),
}

impl<D> ApplyItem<D>
where D: AppData
{
    /// The last log index this item covers.
    pub(crate) fn index(&self) -> u64 {
        match self {
            ApplyItem::Entry(e) => e.index(),
            ApplyItem::Snapshot(s) => s.last_included().index,
        }
    }
}

impl<D> fmt::Display for ApplyItem<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyItem::Entry(e) => write!(f, "Entry({})", e),
            ApplyItem::Snapshot(s) => write!(f, "Snapshot({})", s.meta),
        }
    }
}

/// A bounded FIFO between the critical sections that raise the commit index
/// and the single apply worker.
///
/// Its lock is held only to push or pop. It may be taken while holding the
/// main state lock, never the other way around.
pub(crate) struct ApplyQueue<D>
where D: AppData
{
    capacity: usize,
    items: Mutex<VecDeque<ApplyItem<D>>>,
    notify: Notify,
}

impl<D> ApplyQueue<D>
where D: AppData
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ApplyItem<D>>> {
        // Nothing panics while holding this lock.
        match self.items.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Push the items built by `produce`, which is told how many fit.
    ///
    /// The worker is woken up if anything is pushed. The wake-up is
    /// coalesced: several pushes before the worker runs cost one wake-up.
    pub(crate) fn fill<F>(&self, produce: F)
    where F: FnOnce(usize) -> Vec<ApplyItem<D>> {
        let pushed = {
            let mut items = self.lock();
            let vacancy = self.capacity.saturating_sub(items.len());
            if vacancy == 0 {
                return;
            }

            let new_items = produce(vacancy);
            let n = new_items.len();
            items.extend(new_items);
            n
        };

        if pushed > 0 {
            self.notify.notify_one();
        }
    }

    pub(crate) fn pop(&self) -> Option<ApplyItem<D>> {
        self.lock().pop_front()
    }

    /// Wait until something is pushed since the last wake-up.
    pub(crate) async fn notified(&self) {
        self.notify.notified().await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// The only writer of `last_applied`.
///
/// It delivers items one at a time without holding any lock, then raises
/// `last_applied` and refills the queue in one critical section.
pub(crate) async fn run_apply_worker<D, SM>(
    shared: Arc<Shared<D>>,
    mut state_machine: SM,
) where
    D: AppData,
    SM: StateMachine<D>,
{
    let mut rx_shutdown = shared.subscribe_shutdown();

    loop {
        if *rx_shutdown.borrow() {
            break;
        }

        let Some(item) = shared.apply_queue.pop() else {
            tokio::select! {
                _ = shared.apply_queue.notified() => {}
                _ = rx_shutdown.changed() => {}
            }
            continue;
        };

        let index = item.index();
        debug!(id = shared.id, item = display(&item), "apply");

        let res = match item {
            ApplyItem::Entry(entry) => state_machine.apply(entry).await,
            ApplyItem::Snapshot(snapshot) => {
                state_machine.install_snapshot(snapshot).await
            }
        };

        let res = shared.with_state(|st| {
            res.map_err(|e| Fatal::state_machine(&e))?;
            st.last_applied = max(st.last_applied, index);
            Ok(())
        });

        if res.is_err() {
            break;
        }
    }

    info!(id = shared.id, "apply worker quit");
}

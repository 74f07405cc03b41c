//! Helpers for writing tests against OneRaft types.

use std::io;
use std::sync::Arc;
use std::sync::Mutex;

use crate::storage::PersistentState;
use crate::storage::RaftStorage;
use crate::storage::Snapshot;
use crate::AppData;
use crate::Entry;
use crate::LogId;

/// Builds a log id, for testing purposes.
pub fn log_id(term: u64, index: u64) -> LogId {
    LogId { term, index }
}

/// Create a blank log entry for test.
pub fn blank_ent<D: AppData>(term: u64, index: u64) -> Entry<D> {
    Entry::new_blank(log_id(term, index))
}

/// Create a log entry carrying `data` for test.
pub fn normal_ent<D: AppData>(term: u64, index: u64, data: D) -> Entry<D> {
    Entry::new_normal(log_id(term, index), data)
}

/// What an [`InMemoryStorage`] holds.
#[derive(Debug)]
pub struct Stored<D>
where D: AppData
{
    pub state: Option<PersistentState<D>>,
    pub snapshot: Option<Snapshot>,

    /// Number of successful `save_state()` calls.
    pub saves: u64,

    /// When set, every save fails.
    pub fail_save: bool,
}

/// A plain in-memory [`RaftStorage`] whose content can be inspected and
/// shared by clones.
#[derive(Debug, Clone)]
pub struct InMemoryStorage<D>
where D: AppData
{
    pub stored: Arc<Mutex<Stored<D>>>,
}

impl<D> Default for InMemoryStorage<D>
where D: AppData
{
    fn default() -> Self {
        Self {
            stored: Arc::new(Mutex::new(Stored {
                state: None,
                snapshot: None,
                saves: 0,
                fail_save: false,
            })),
        }
    }
}

impl<D> InMemoryStorage<D>
where D: AppData
{
    /// Build a storage that already holds `state`.
    pub fn with_state(state: PersistentState<D>) -> Self {
        let s = Self::default();
        s.lock().state = Some(state);
        s
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, Stored<D>> {
        match self.stored.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The last saved state.
    pub fn state(&self) -> Option<PersistentState<D>> {
        self.lock().state.clone()
    }

    pub fn fail_save(&self, fail: bool) {
        self.lock().fail_save = fail;
    }
}

impl<D> RaftStorage<D> for InMemoryStorage<D>
where D: AppData
{
    fn load_state(&mut self) -> Result<Option<PersistentState<D>>, io::Error> {
        Ok(self.lock().state.clone())
    }

    fn save_state(
        &mut self,
        state: &PersistentState<D>,
    ) -> Result<(), io::Error> {
        let mut stored = self.lock();
        if stored.fail_save {
            return Err(io::Error::new(io::ErrorKind::Other, "injected"));
        }
        stored.state = Some(state.clone());
        stored.saves += 1;
        Ok(())
    }

    fn load_snapshot(&mut self) -> Result<Option<Snapshot>, io::Error> {
        Ok(self.lock().snapshot.clone())
    }

    fn save_snapshot(
        &mut self,
        snapshot: &Snapshot,
    ) -> Result<(), io::Error> {
        let mut stored = self.lock();
        if stored.fail_save {
            return Err(io::Error::new(io::ErrorKind::Other, "injected"));
        }
        stored.snapshot = Some(snapshot.clone());
        Ok(())
    }
}

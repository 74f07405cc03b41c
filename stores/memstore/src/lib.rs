//! In-memory implementations of the OneRaft storage and state machine
//! boundaries, for tests and demos.

mod state_machine;


use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use oneraft::storage::PersistentState;
use oneraft::AppData;
use oneraft::RaftStorage;
use oneraft::Snapshot;
use tracing::debug;

pub use crate::state_machine::Cmd;
pub use crate::state_machine::KvState;
pub use crate::state_machine::MemStateMachine;

#[derive(Debug, Default)]
struct Stored {
    state: Option<Vec<u8>>,
    snapshot: Option<Vec<u8>>,
    saves: u64,
    fail_save: bool,
}

/// An in-memory storage implementing the [`RaftStorage`] trait.
///
/// Everything is kept serialized, as a disk would hold it, thus what a node
/// reads back is never an alias of what it is still mutating. Clones share
/// the same content: a node restarted with a clone of the storage of a
/// stopped node sees exactly what was saved before it stopped.
pub struct MemStorage<D>
where D: AppData
{
    stored: Arc<Mutex<Stored>>,
    _p: PhantomData<fn() -> D>,
}

impl<D> Clone for MemStorage<D>
where D: AppData
{
    fn clone(&self) -> Self {
        Self {
            stored: self.stored.clone(),
            _p: PhantomData,
        }
    }
}

impl<D> Default for MemStorage<D>
where D: AppData
{
    fn default() -> Self {
        Self {
            stored: Arc::new(Mutex::new(Stored::default())),
            _p: PhantomData,
        }
    }
}

impl<D> fmt::Debug for MemStorage<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemStorage").field("stored", &self.stored).finish()
    }
}

impl<D> MemStorage<D>
where D: AppData
{
    fn lock(&self) -> MutexGuard<'_, Stored> {
        match self.stored.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make every following save fail, or succeed again.
    pub fn fail_save(&self, fail: bool) {
        self.lock().fail_save = fail;
    }

    /// Number of successful `save_state()` calls.
    pub fn saves(&self) -> u64 {
        self.lock().saves
    }

    /// Decode the last saved state.
    pub fn state(&self) -> Result<Option<PersistentState<D>>, io::Error> {
        let stored = self.lock();
        decode(stored.state.as_deref())
    }

    /// Decode the last saved snapshot.
    pub fn snapshot(&self) -> Result<Option<Snapshot>, io::Error> {
        let stored = self.lock();
        decode(stored.snapshot.as_deref())
    }
}

fn decode<T>(buf: Option<&[u8]>) -> Result<Option<T>, io::Error>
where T: for<'a> serde::Deserialize<'a> {
    let Some(buf) = buf else {
        return Ok(None);
    };
    let v = serde_json::from_slice(buf)?;
    Ok(Some(v))
}

fn injected() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "injected save failure")
}

impl<D> RaftStorage<D> for MemStorage<D>
where D: AppData
{
    fn load_state(&mut self) -> Result<Option<PersistentState<D>>, io::Error> {
        let got = self.state()?;
        debug!(
            "MemStorage::load_state: {}",
            got.as_ref().map(|s| s.to_string()).unwrap_or_default()
        );
        Ok(got)
    }

    fn save_state(
        &mut self,
        state: &PersistentState<D>,
    ) -> Result<(), io::Error> {
        let buf = serde_json::to_vec(state)?;

        let mut stored = self.lock();
        if stored.fail_save {
            return Err(injected());
        }

        debug!("MemStorage::save_state: {}, size={}", state, buf.len());
        stored.state = Some(buf);
        stored.saves += 1;
        Ok(())
    }

    fn load_snapshot(&mut self) -> Result<Option<Snapshot>, io::Error> {
        self.snapshot()
    }

    fn save_snapshot(
        &mut self,
        snapshot: &Snapshot,
    ) -> Result<(), io::Error> {
        let buf = serde_json::to_vec(snapshot)?;

        let mut stored = self.lock();
        if stored.fail_save {
            return Err(injected());
        }

        debug!("MemStorage::save_snapshot: {}", snapshot);
        stored.snapshot = Some(buf);
        Ok(())
    }
}

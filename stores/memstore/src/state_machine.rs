use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use oneraft::Entry;
use oneraft::EntryPayload;
use oneraft::LogId;
use oneraft::LogIdOptionExt;
use oneraft::Snapshot;
use oneraft::StateMachine;
use tracing::debug;

/// A command of the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Cmd {
    Set { key: String, value: String },
    Delete { key: String },
}

impl Cmd {
    pub fn set(key: impl ToString, value: impl ToString) -> Self {
        Cmd::Set {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn delete(key: impl ToString) -> Self {
        Cmd::Delete {
            key: key.to_string(),
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmd::Set { key, value } => write!(f, "set {}={}", key, value),
            Cmd::Delete { key } => write!(f, "delete {}", key),
        }
    }
}

/// The content of the key-value store, also the content of its snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct KvState {
    pub last_applied: Option<LogId>,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct SmData {
    kv: KvState,

    /// Log ids of the entries applied, in the order they are received.
    applied: Vec<LogId>,

    /// Snapshots installed, in the order they are received.
    installed: Vec<LogId>,

    /// Sleep before applying every entry.
    apply_delay: Option<Duration>,
}

/// An in-memory key-value state machine.
///
/// It ignores entries and snapshots that are not newer than what it already
/// has, so that redelivery after a restart is harmless. Clones share the
/// same content.
#[derive(Debug, Clone, Default)]
pub struct MemStateMachine {
    inner: Arc<Mutex<SmData>>,
}

impl MemStateMachine {
    fn lock(&self) -> MutexGuard<'_, SmData> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().kv.data.get(key).cloned()
    }

    pub fn state(&self) -> KvState {
        self.lock().kv.clone()
    }

    pub fn last_applied(&self) -> Option<LogId> {
        self.lock().kv.last_applied
    }

    /// The log ids of every entry applied so far.
    pub fn applied(&self) -> Vec<LogId> {
        self.lock().applied.clone()
    }

    /// The last log id of every snapshot installed so far.
    pub fn installed(&self) -> Vec<LogId> {
        self.lock().installed.clone()
    }

    pub fn set_apply_delay(&self, delay: Option<Duration>) {
        self.lock().apply_delay = delay;
    }

    /// Serialize the current content.
    ///
    /// Returns the index it covers and the data to build a snapshot with.
    pub fn build_snapshot(&self) -> Result<(u64, Vec<u8>), io::Error> {
        let sm = self.lock();
        let data = serde_json::to_vec(&sm.kv)?;
        Ok((sm.kv.last_applied.index(), data))
    }
}

impl StateMachine<Cmd> for MemStateMachine {
    async fn apply(&mut self, entry: Entry<Cmd>) -> Result<(), io::Error> {
        let delay = self.lock().apply_delay;
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let mut sm = self.lock();

        if entry.index() <= sm.kv.last_applied.index() {
            debug!(
                "MemStateMachine: ignore {}, last_applied: {:?}",
                entry.log_id, sm.kv.last_applied
            );
            return Ok(());
        }

        match &entry.payload {
            EntryPayload::Blank => {}
            EntryPayload::Normal(Cmd::Set { key, value }) => {
                sm.kv.data.insert(key.clone(), value.clone());
            }
            EntryPayload::Normal(Cmd::Delete { key }) => {
                sm.kv.data.remove(key);
            }
        }

        debug!("MemStateMachine: applied {}", entry);
        sm.kv.last_applied = Some(entry.log_id);
        sm.applied.push(entry.log_id);
        Ok(())
    }

    async fn install_snapshot(
        &mut self,
        snapshot: Snapshot,
    ) -> Result<(), io::Error> {
        let kv: KvState = serde_json::from_slice(&snapshot.data)?;

        let mut sm = self.lock();
        sm.installed.push(snapshot.last_included());

        if snapshot.last_included().index <= sm.kv.last_applied.index() {
            debug!(
                "MemStateMachine: ignore {}, last_applied: {:?}",
                snapshot, sm.kv.last_applied
            );
            return Ok(());
        }

        debug!("MemStateMachine: installed {}", snapshot);
        sm.kv = kv;
        sm.kv.last_applied = Some(snapshot.last_included());
        Ok(())
    }
}

use std::fmt;

use crate::base::DisplayOptionExt;
use crate::storage::log::LogStore;
use crate::AppData;
use crate::NodeId;

/// The state a node has to save durably before it acts on it.
///
/// It is written through [`RaftStorage::save_state`] before granting a vote,
/// after adopting a new term and after appending or truncating entries, and
/// always before the reply or request that depends on it leaves the node.
///
/// [`RaftStorage::save_state`]: crate::storage::RaftStorage::save_state
#[derive(Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(bound = "")]
pub struct PersistentState<D>
where D: AppData
{
    /// Monotonic, never decreases.
    pub current_term: u64,

    /// The candidate this node voted for in `current_term`.
    pub voted_for: Option<NodeId>,

    pub log: LogStore<D>,
}

impl<D> Default for PersistentState<D>
where D: AppData
{
    fn default() -> Self {
        Self {
            current_term: 0,
            voted_for: None,
            log: LogStore::default(),
        }
    }
}

impl<D> fmt::Debug for PersistentState<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentState")
            .field("current_term", &self.current_term)
            .field("voted_for", &self.voted_for)
            .field("log", &self.log)
            .finish()
    }
}

impl<D> fmt::Display for PersistentState<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{term:{}, voted_for:{}, log:{}}}",
            self.current_term,
            self.voted_for.display(),
            self.log
        )
    }
}

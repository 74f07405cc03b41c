use std::fmt;

use crate::base::DisplayOptionExt;
use crate::storage::log::entry::Entry;
use crate::storage::log::log_id::LogId;
use crate::storage::log::log_id::LogIdOptionExt;
use crate::AppData;

/// The ordered log of a node.
///
/// Entries are indexed from 1 and are always consecutive. The prefix up to
/// `snapshot_last` has been compacted into a snapshot: only its last log id is
/// kept, which is enough to answer consistency checks at the boundary.
///
/// - Appending never leaves a hole;
/// - Truncation only removes a suffix;
/// - Compaction only removes a prefix.
#[derive(Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(bound = "")]
pub struct LogStore<D>
where D: AppData
{
    snapshot_last: Option<LogId>,
    entries: Vec<Entry<D>>,
}

impl<D> Default for LogStore<D>
where D: AppData
{
    fn default() -> Self {
        Self {
            snapshot_last: None,
            entries: vec![],
        }
    }
}

impl<D> fmt::Debug for LogStore<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("snapshot_last", &self.snapshot_last)
            .field("entries", &self.entries)
            .finish()
    }
}

impl<D> fmt::Display for LogStore<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{snapshot_last:{}, last:{}, n:{}}}",
            self.snapshot_last.display(),
            self.last_log_id().display(),
            self.entries.len()
        )
    }
}

impl<D> LogStore<D>
where D: AppData
{
    /// The last log id compacted into a snapshot.
    pub fn snapshot_last(&self) -> Option<LogId> {
        self.snapshot_last
    }

    /// The index of the last compacted log, or 0.
    pub fn snapshot_index(&self) -> u64 {
        self.snapshot_last.index()
    }

    /// The index of the first entry still present, which may not exist yet.
    pub fn first_index(&self) -> u64 {
        self.snapshot_last.next_index()
    }

    pub fn last_log_id(&self) -> Option<LogId> {
        match self.entries.last() {
            Some(e) => Some(e.log_id),
            None => self.snapshot_last,
        }
    }

    pub fn last_index(&self) -> u64 {
        self.last_log_id().index()
    }

    pub fn last_term(&self) -> u64 {
        self.last_log_id().term()
    }

    /// Returns `true` if there is neither an entry nor a snapshot.
    pub fn is_empty(&self) -> bool {
        self.last_log_id().is_none()
    }

    /// Number of entries held in memory, excluding the compacted prefix.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn offset(&self, index: u64) -> Option<usize> {
        if index < self.first_index() {
            return None;
        }
        let off = (index - self.first_index()) as usize;
        if off < self.entries.len() {
            Some(off)
        } else {
            None
        }
    }

    /// Get the entry at `index` if it is present and not compacted.
    pub fn get(&self, index: u64) -> Option<&Entry<D>> {
        self.offset(index).map(|off| &self.entries[off])
    }

    /// Returns the term of the log at `index`.
    ///
    /// Index 0 always has term 0. The boundary of the compacted prefix still
    /// has a known term. `None` is returned for a compacted or absent index.
    pub fn term_at(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        if let Some(last) = self.snapshot_last {
            if index == last.index {
                return Some(last.term);
            }
        }
        self.get(index).map(|e| e.log_id.term)
    }

    /// Returns `true` if the log contains `log_id`, including the snapshot
    /// boundary and the virtual log at index 0.
    pub fn has_log_id(&self, index: u64, term: u64) -> bool {
        self.term_at(index) == Some(term)
    }

    /// Append one entry right after the last one.
    pub fn append(&mut self, entry: Entry<D>) {
        debug_assert_eq!(
            entry.log_id.index,
            self.last_index() + 1,
            "log must be consecutive"
        );
        debug_assert!(entry.log_id.term >= self.last_term());

        self.entries.push(entry);
    }

    /// Remove all entries at and after `index`.
    pub fn truncate_from(&mut self, index: u64) {
        debug_assert!(index > self.snapshot_index(), "can not truncate snapshot");

        if index < self.first_index() {
            self.entries.clear();
            return;
        }
        let off = (index - self.first_index()) as usize;
        self.entries.truncate(off);
    }

    /// Clone entries from `start` to the end, at most `max` of them.
    pub fn entries_from(&self, start: u64, max: u64) -> Vec<Entry<D>> {
        let Some(off) = self.offset(start) else {
            return vec![];
        };
        let end = std::cmp::min(self.entries.len(), off + max as usize);
        self.entries[off..end].to_vec()
    }

    /// The first index in the log, at or below `upto`, of the run of entries
    /// with `term` that contains `upto`.
    pub fn first_index_of_term(&self, term: u64, upto: u64) -> u64 {
        let mut idx = upto;
        while idx > self.first_index() {
            if self.term_at(idx - 1) != Some(term) {
                break;
            }
            idx -= 1;
        }
        idx
    }

    /// The last index holding an entry with `term`, if any.
    pub fn last_index_of_term(&self, term: u64) -> Option<u64> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.log_id.term == term)
            .map(|e| e.log_id.index)
    }

    /// Discard the prefix up to and including `upto`.
    ///
    /// If the entry at `upto.index` matches `upto`, the following entries are
    /// retained; otherwise the whole log is replaced by the snapshot boundary.
    pub fn compact(&mut self, upto: LogId) {
        if upto.index <= self.snapshot_index() {
            return;
        }

        if self.get(upto.index).map(|e| e.log_id) == Some(upto) {
            let Some(off) = self.offset(upto.index) else {
                return;
            };
            self.entries.drain(..=off);
        } else {
            self.entries.clear();
        }

        self.snapshot_last = Some(upto);
    }

    /// Iterate entries that are not compacted.
    pub fn iter(&self) -> impl Iterator<Item = &Entry<D>> {
        self.entries.iter()
    }
}

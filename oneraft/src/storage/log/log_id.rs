//! This mod defines the identity of a raft log and provides supporting
//! utilities to work with log id related types.

use std::fmt::Display;
use std::fmt::Formatter;

/// The identity of a raft log.
///
/// The log id serves as unique identifier for a log entry across the system.
/// It is composed of two parts: the term of the leader that proposed this log,
/// and an integer index.
///
/// Log ids are ordered by term first, then by index, which is exactly the
/// "at least as up-to-date" order used when granting votes.
#[derive(Debug, Default, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct LogId {
    pub term: u64,
    /// The index of a log in the storage.
    ///
    /// Log index is a consecutive integer starting from 1.
    pub index: u64,
}

impl Display for LogId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}-{}", self.term, self.index)
    }
}

impl LogId {
    pub fn new(term: u64, index: u64) -> Self {
        LogId { term, index }
    }
}

/// This helper trait extracts information from an `Option<LogId>`.
///
/// `None` stands for the position before the first log, i.e., index 0 in
/// term 0.
pub trait LogIdOptionExt {
    /// Returns the log index, or 0 if it is a `None`.
    fn index(&self) -> u64;

    /// Returns the term, or 0 if it is a `None`.
    fn term(&self) -> u64;

    /// Returns the index right after this log id.
    fn next_index(&self) -> u64 {
        self.index() + 1
    }
}

impl LogIdOptionExt for LogId {
    fn index(&self) -> u64 {
        self.index
    }

    fn term(&self) -> u64 {
        self.term
    }
}

impl<T> LogIdOptionExt for Option<T>
where T: LogIdOptionExt
{
    fn index(&self) -> u64 {
        self.as_ref().map(|x| x.index()).unwrap_or_default()
    }

    fn term(&self) -> u64 {
        self.as_ref().map(|x| x.term()).unwrap_or_default()
    }
}

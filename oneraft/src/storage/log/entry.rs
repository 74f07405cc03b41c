use std::fmt;

use crate::storage::log::log_id::LogId;
use crate::AppData;

/// Payload of a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(bound = "")]
pub enum EntryPayload<D>
where D: AppData
{
    /// An empty payload proposed by a leader at the start of its term.
    Blank,

    /// A command submitted by the application.
    Normal(D),
}

/// A OneRaft log entry.
#[derive(Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(bound = "")]
pub struct Entry<D>
where D: AppData
{
    pub log_id: LogId,

    /// This entry's payload.
    pub payload: EntryPayload<D>,
}

impl<D> Entry<D>
where D: AppData
{
    pub fn new_blank(log_id: LogId) -> Self {
        Self {
            log_id,
            payload: EntryPayload::Blank,
        }
    }

    pub fn new_normal(log_id: LogId, data: D) -> Self {
        Self {
            log_id,
            payload: EntryPayload::Normal(data),
        }
    }

    pub fn index(&self) -> u64 {
        self.log_id.index
    }

    pub fn term(&self) -> u64 {
        self.log_id.term
    }

    /// Returns the application command, or `None` for a blank entry.
    pub fn command(&self) -> Option<&D> {
        match &self.payload {
            EntryPayload::Blank => None,
            EntryPayload::Normal(d) => Some(d),
        }
    }
}

impl<D> fmt::Debug for Entry<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("log_id", &self.log_id)
            .field("payload", &self.payload)
            .finish()
    }
}

impl<D> fmt::Display for Entry<D>
where D: AppData
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            EntryPayload::Blank => write!(f, "{}:blank", self.log_id),
            EntryPayload::Normal(d) => write!(f, "{}:{:?}", self.log_id, d),
        }
    }
}

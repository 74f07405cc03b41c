//! Log entries, their identity and the in-memory log.

pub mod entry;
pub mod log_id;
mod log_store;


pub use log_store::LogStore;

//! OneRaft metrics for observability.
//!
//! Metrics are observed on a running node via the [`Raft::metrics() ->
//! watch::Receiver<Metrics>`](`crate::Raft::metrics`) method. A new value is
//! published at the end of every critical section that changed one of the
//! fields.
//!
//! Metrics is not a stream thus it only guarantees to provide the latest state
//! but not every change of the state.
//! Because internally, `watch::channel()` only stores one last state.

mod metric;
mod metrics;
mod server_state;
mod wait;
mod wait_condition;


pub use metric::Metric;
pub use metrics::Metrics;
pub use server_state::ServerState;
pub use wait::Wait;
pub use wait::WaitError;
pub(crate) use wait_condition::Condition;

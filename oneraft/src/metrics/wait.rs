use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::metrics::Condition;
use crate::metrics::Metric;
use crate::metrics::Metrics;
use crate::metrics::ServerState;
use crate::NodeId;

// Error variants related to metrics.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timeout after {0:?} when {1}")]
    Timeout(Duration, String),

    #[error("oneraft is shutting down")]
    ShuttingDown,
}

/// Wait is a wrapper of the Metrics channel that impls several utils to wait
/// for metrics to satisfy some condition.
pub struct Wait {
    pub timeout: Duration,
    pub rx: watch::Receiver<Metrics>,
}

impl Wait {
    /// Wait for metrics to satisfy some condition or timeout.
    #[tracing::instrument(level = "trace", skip(self, func), fields(msg=%msg.to_string()))]
    pub async fn metrics<T>(
        &self,
        func: T,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError>
    where
        T: Fn(&Metrics) -> bool + Send,
    {
        let timeout_at = Instant::now() + self.timeout;

        let mut rx = self.rx.clone();
        loop {
            let latest = rx.borrow_and_update().clone();

            tracing::debug!(
                "id={} wait {:} latest: {}",
                latest.id,
                msg.to_string(),
                latest
            );

            if func(&latest) {
                tracing::debug!(
                    "id={} done wait {:} latest: {}",
                    latest.id,
                    msg.to_string(),
                    latest
                );
                return Ok(latest);
            }

            if latest.running_state.is_err() {
                return Err(WaitError::ShuttingDown);
            }

            tokio::select! {
                _ = tokio::time::sleep_until(timeout_at) => {
                    tracing::debug!("id={} timeout wait {:} latest: {}", latest.id, msg.to_string(), latest);
                    return Err(WaitError::Timeout(self.timeout, format!("{} latest: {}", msg.to_string(), latest)));
                }
                changed = rx.changed() => {
                    if let Err(err) = changed {
                        tracing::debug!(
                            "id={} error: {:?}; wait {:} latest: {:?}",
                            latest.id,
                            err,
                            msg.to_string(),
                            latest
                        );

                        return Err(WaitError::ShuttingDown);
                    }
                }
            }
        }
    }

    /// Wait for `current_leader` to become `Some(leader_id)` until timeout.
    #[tracing::instrument(level = "trace", skip(self), fields(msg=msg.to_string().as_str()))]
    pub async fn current_leader(
        &self,
        leader_id: NodeId,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.metrics(
            |m| m.current_leader == Some(leader_id),
            &format!("{} .current_leader == {}", msg.to_string(), leader_id),
        )
        .await
    }

    /// Wait for `state` to become `want_state` or timeout.
    #[tracing::instrument(level = "trace", skip(self), fields(msg=msg.to_string().as_str()))]
    pub async fn state(
        &self,
        want_state: ServerState,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.metrics(
            |m| m.server_state == want_state,
            &format!("{} .state == {:?}", msg.to_string(), want_state),
        )
        .await
    }

    /// Block until the term becomes at least `term` or timeout.
    pub async fn term_at_least(
        &self,
        term: u64,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.ge(Metric::Term(term), msg).await
    }

    /// Block until the last log index becomes at least `index`(inclusive) or
    /// timeout.
    pub async fn log_index_at_least(
        &self,
        index: u64,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.ge(Metric::LastLogIndex(index), msg).await
    }

    /// Block until the last log index becomes exactly `index` or timeout.
    pub async fn log_index(
        &self,
        index: u64,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.eq(Metric::LastLogIndex(index), msg).await
    }

    /// Block until the commit index becomes at least `index` or timeout.
    pub async fn commit_index_at_least(
        &self,
        index: u64,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.ge(Metric::CommitIndex(index), msg).await
    }

    /// Block until the state machine has received at least `index` or
    /// timeout.
    pub async fn applied_index_at_least(
        &self,
        index: u64,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.ge(Metric::AppliedIndex(index), msg).await
    }

    /// Block until a metric becomes greater than or equal the specified value
    /// or timeout.
    ///
    /// For example, to await until the term becomes 2 or greater:
    /// ```ignore
    /// my_raft.wait(None).ge(Metric::Term(2), "become term 2").await?;
    /// ```
    pub async fn ge(
        &self,
        metric: Metric,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.until(Condition::GE(metric), msg).await
    }

    /// Block until a metric becomes equal to the specified value or timeout.
    pub async fn eq(
        &self,
        metric: Metric,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.until(Condition::EQ(metric), msg).await
    }

    /// Block until a metric satisfies the specified condition or timeout.
    #[tracing::instrument(level = "trace", skip_all, fields(cond=cond.to_string(), msg=msg.to_string().as_str()))]
    pub(crate) async fn until(
        &self,
        cond: Condition,
        msg: impl ToString,
    ) -> Result<Metrics, WaitError> {
        self.metrics(
            |metrics| match &cond {
                Condition::GE(expect) => metrics >= expect,
                Condition::EQ(expect) => metrics == expect,
            },
            &format!("{} .{}", msg.to_string(), cond),
        )
        .await
    }
}

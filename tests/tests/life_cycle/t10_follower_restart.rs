use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use oneraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// A follower that was down while the cluster went on comes back with its
/// saved term and log, and catches up.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn follower_restart() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;
    let first = cluster.submit_many(leader, "foo", 5).await?;
    cluster.wait_applied(&members, first.index, timeout(), "foo").await?;

    let follower =
        members.iter().copied().find(|x| *x != leader).unwrap_or_default();
    let term = cluster.metrics(follower)?.current_term;

    cluster.stop(follower).await?;

    tracing::info!("--- the other two nodes still commit");
    let last = cluster.submit_many(leader, "bar", 10).await?;
    let rest = members.iter().copied().filter(|x| *x != follower).collect();
    cluster.wait_applied(&rest, last.index, timeout(), "bar").await?;

    tracing::info!("--- restart n{}", follower);
    cluster.start(follower).await?;

    let m = cluster.metrics(follower)?;
    assert!(m.current_term >= term);
    assert!(m.last_log_index >= first.index);

    cluster
        .wait_applied(&btreeset! {follower}, last.index, timeout(), "catch up")
        .await?;

    // Everything is delivered again to the new state machine.
    let sm = cluster.state_machine(follower)?;
    assert_eq!(Some(1), sm.applied().first().map(|x| x.index));
    assert_eq!(Some("4".to_string()), sm.get("foo-4"));
    assert_eq!(Some("9".to_string()), sm.get("bar-9"));

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use memstore::Cmd;
use oneraft::errors::Fatal;
use oneraft::metrics::WaitError;
use oneraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// After `shutdown()` every API call returns `Fatal::Stopped`; the other
/// nodes see it as unreachable.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn shutdown() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;
    let raft = cluster.raft(leader)?;

    raft.shutdown().await?;

    let res = raft.submit(Cmd::set("foo", 1)).await;
    assert_eq!(Err(Fatal::Stopped), res.map(|_| ()));

    let m = cluster.metrics(leader)?;
    assert_eq!(Err(Fatal::Stopped), m.running_state);
    assert!(!raft.is_leader());

    let res = raft.wait(timeout()).state(m.server_state, "any").await;
    assert!(matches!(res, Ok(_) | Err(WaitError::ShuttingDown)));

    // Shutting down twice is fine.
    raft.shutdown().await?;

    tracing::info!("--- the others elect a new leader");
    let rest = members.iter().copied().filter(|x| *x != leader).collect();
    let new = cluster.wait_for_leader(&rest, timeout(), "re-elect").await?;
    assert!(new != leader);

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

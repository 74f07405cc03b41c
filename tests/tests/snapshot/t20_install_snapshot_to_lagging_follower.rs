use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use memstore::Cmd;
use oneraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// A follower that missed entries already compacted on the other nodes is
/// brought up to date with a snapshot, then with the entries after it.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn install_snapshot_to_lagging_follower() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;

    let lagging =
        members.iter().copied().find(|x| *x != leader).unwrap_or_default();
    let others = members
        .iter()
        .copied()
        .filter(|x| *x != lagging)
        .collect::<BTreeSet<_>>();

    tracing::info!("--- isolate n{}", lagging);
    cluster.raft(lagging)?.runtime_config().elect(false);
    cluster.network.isolate(lagging);

    let last = cluster.submit_many(leader, "foo", 50).await?;
    cluster.wait_applied(&others, last.index, timeout(), "foo").await?;

    tracing::info!("--- compact the log of {:?}", others);
    for id in others.iter() {
        let index = cluster.snapshot(*id).await?;
        assert!(index >= last.index);
    }

    tracing::info!("--- heal");
    cluster.network.heal();

    cluster
        .wait_applied(&btreeset! {lagging}, last.index, timeout(), "catch up")
        .await?;

    let sm = cluster.state_machine(lagging)?;
    let installed = sm.installed();
    assert!(!installed.is_empty());
    assert!(installed.iter().all(|x| x.index >= last.index));
    assert_eq!(Some("49".to_string()), sm.get("foo-49"));

    tracing::info!("--- entries after the snapshot");
    let log_id = cluster.submit(leader, Cmd::set("bar", 1)).await?;
    cluster.wait_applied(&members, log_id.index, timeout(), "bar").await?;

    assert_eq!(
        cluster.state_machine(leader)?.state().data,
        cluster.state_machine(lagging)?.state().data
    );

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

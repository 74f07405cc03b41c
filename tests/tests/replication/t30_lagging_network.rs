use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use oneraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// Every RPC is delayed, but well within the election timeout: the cluster
/// still elects a leader and replicates.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn lagging_network() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.network.set_delay(Some(Duration::from_millis(20)));
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;

    let last = cluster.submit_many(leader, "foo", 20).await?;
    cluster.wait_applied(&members, last.index, timeout(), "foo").await?;

    for id in members.iter() {
        let sm = cluster.state_machine(*id)?;
        assert_eq!(Some("19".to_string()), sm.get("foo-19"));
    }

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(10_000))
}

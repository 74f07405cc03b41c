use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use oneraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// A backlog longer than `max_payload_entries` is replicated in several
/// requests, without waiting for heartbeats in between.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn replicate_in_batches() -> Result<()> {
    let config = Arc::new(
        Config {
            max_payload_entries: 10,
            ..Default::default()
        }
        .validate()?,
    );
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;

    let n = 100;
    let last = cluster.submit_many(leader, "foo", n).await?;
    cluster.wait_applied(&members, last.index, timeout(), "foo").await?;

    tracing::info!("--- logs and state machines are the same");
    {
        let want = cluster.storage(leader).state()?.map(|s| s.log);
        let want_sm = cluster.state_machine(leader)?.state();
        assert_eq!(n as usize, want_sm.data.len());

        for id in members.iter() {
            let got = cluster.storage(*id).state()?.map(|s| s.log);
            assert_eq!(want, got, "n{} log", id);
            assert_eq!(want_sm, cluster.state_machine(*id)?.state());
        }
    }

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(10_000))
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use memstore::Cmd;
use oneraft::Config;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// Commands submitted one after another are delivered to every state
/// machine once, in log index order, without gaps.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn total_order_apply() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;

    let mut submitted = vec![];
    for i in 1..=5 {
        let log_id = cluster.submit(leader, Cmd::set("k", i)).await?;
        submitted.push(log_id);
    }
    let last = submitted[4];

    cluster.wait_applied(&members, last.index, timeout(), "C1..C5").await?;

    for id in members.iter() {
        let sm = cluster.state_machine(*id)?;
        assert_eq!(Some("5".to_string()), sm.get("k"), "n{}", id);

        let applied = sm.applied();
        let indexes = applied.iter().map(|x| x.index).collect::<Vec<_>>();
        let want = (1..=indexes.len() as u64).collect::<Vec<_>>();
        assert_eq!(want, indexes, "n{}: in order, no gap", id);

        for log_id in submitted.iter() {
            assert!(applied.contains(log_id), "n{}: {} applied", id, log_id);
        }
    }

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

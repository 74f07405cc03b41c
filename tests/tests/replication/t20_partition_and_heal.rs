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

/// A 5-node cluster is split: the leader with one follower on one side, the
/// other three on the other side.
///
/// - The majority elects a new leader of a higher term and commits.
/// - What the old leader accepted meanwhile is never committed.
/// - After healing, the divergent entries are overwritten and every node
///   ends up with the same log.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn partition_and_heal() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3,4,5};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let old = cluster.wait_for_leader(&members, timeout(), "init").await?;
    let old_term = cluster.metrics(old)?.current_term;

    let follower =
        members.iter().copied().find(|x| *x != old).unwrap_or_default();
    let minority = btreeset! {old, follower};
    let majority = members
        .iter()
        .copied()
        .filter(|x| !minority.contains(x))
        .collect::<BTreeSet<_>>();

    tracing::info!("--- partition: {:?} | {:?}", minority, majority);
    cluster.network.partition(vec![minority.clone(), majority.clone()]);

    tracing::info!("--- the old leader still accepts commands");
    let mut lost = vec![];
    for i in 0..3 {
        let cmd = Cmd::set(format!("lost-{}", i), i);
        let log_id = cluster.submit(old, cmd).await?;
        lost.push(log_id);
    }

    let new = cluster.wait_for_leader(&majority, timeout(), "re-elect").await?;
    assert!(cluster.metrics(new)?.current_term > old_term);

    let last = cluster.submit_many(new, "kept", 5).await?;
    cluster.wait_applied(&majority, last.index, timeout(), "kept").await?;

    for log_id in lost.iter() {
        assert!(cluster.metrics(old)?.commit_index < log_id.index);
    }

    tracing::info!("--- heal");
    cluster.network.heal();

    let leader = cluster.wait_for_leader(&members, timeout(), "healed").await?;
    assert!(majority.contains(&leader));

    cluster.wait_applied(&members, last.index, timeout(), "converge").await?;

    for id in members.iter() {
        let sm = cluster.state_machine(*id)?;
        assert_eq!(None, sm.get("lost-0"), "n{}", id);
        assert_eq!(Some("4".to_string()), sm.get("kept-4"), "n{}", id);

        let applied = sm.applied();
        assert!(lost.iter().all(|x| !applied.contains(x)), "n{}", id);
    }

    tracing::info!("--- every node has the same log prefix");
    {
        let logs = members
            .iter()
            .map(|id| cluster.storage(*id).state())
            .collect::<Result<Vec<_>, _>>()?;

        let prefix = |i: usize| {
            logs[i].as_ref().map(|s| {
                (1..=last.index)
                    .map(|index| s.log.get(index).map(|e| e.log_id))
                    .collect::<Vec<_>>()
            })
        };

        for i in 1..logs.len() {
            assert_eq!(prefix(0), prefix(i));
        }
    }

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

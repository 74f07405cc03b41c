use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use oneraft::Config;
use oneraft::ServerState;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// An isolated leader keeps believing it is the leader of its term, and steps
/// down as soon as it hears of the newer term after the network heals.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn stale_leader_steps_down() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let old = cluster.wait_for_leader(&members, timeout(), "init").await?;
    let old_term = cluster.metrics(old)?.current_term;

    tracing::info!("--- isolate leader {}", old);
    cluster.network.isolate(old);

    let rest = members
        .iter()
        .copied()
        .filter(|x| *x != old)
        .collect::<BTreeSet<_>>();
    let new = cluster.wait_for_leader(&rest, timeout(), "re-elect").await?;
    assert_ne!(old, new);

    let new_term = cluster.metrics(new)?.current_term;
    assert!(new_term > old_term);

    // Nobody told it about the new term.
    let m = cluster.metrics(old)?;
    assert_eq!(ServerState::Leader, m.server_state);
    assert_eq!(old_term, m.current_term);

    tracing::info!("--- heal");
    cluster.network.heal();

    cluster
        .wait(old, timeout())?
        .state(ServerState::Follower, "old leader steps down")
        .await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "healed").await?;
    assert!(cluster.metrics(leader)?.current_term >= new_term);

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

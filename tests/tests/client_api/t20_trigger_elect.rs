use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use memstore::Cmd;
use oneraft::errors::ForwardToLeader;
use oneraft::Config;
use oneraft::ServerState;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// With timer based election disabled, nobody becomes leader until the
/// application asks a node to stand for election.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn trigger_elect() -> Result<()> {
    let config = Arc::new(
        Config {
            enable_elect: false,
            ..Default::default()
        }
        .validate()?,
    );
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config.clone(), members.clone());
    cluster.start_all().await?;

    tokio::time::sleep(Duration::from_millis(config.election_timeout_max * 2))
        .await;

    for id in members.iter() {
        let m = cluster.metrics(*id)?;
        assert_eq!(ServerState::Follower, m.server_state);
        assert_eq!(0, m.current_term);
        assert_eq!(None, m.current_leader);
    }

    let res = cluster.raft(1)?.submit(Cmd::set("foo", 1)).await?;
    assert_eq!(Err(ForwardToLeader::empty()), res);

    tracing::info!("--- trigger election on n2");
    cluster.raft(2)?.trigger_elect().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "elected").await?;
    assert_eq!(2, leader);
    assert_eq!(1, cluster.metrics(2)?.current_term);

    // Triggering on the leader changes nothing.
    cluster.raft(2)?.trigger_elect().await?;
    assert_eq!(1, cluster.metrics(2)?.current_term);

    let log_id = cluster.submit(2, Cmd::set("foo", 1)).await?;
    cluster.wait_applied(&members, log_id.index, timeout(), "foo").await?;

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use oneraft::Config;
use oneraft::ServerState;
use pretty_assertions::assert_eq;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

/// A freshly started cluster elects exactly one leader, and every node
/// learns it.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn elect_one_leader() -> Result<()> {
    let config = Arc::new(Config::default().validate()?);
    let members = btreeset! {1,2,3};

    let mut cluster = TypedCluster::new(config, members.clone());
    cluster.start_all().await?;

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;
    let term = cluster.metrics(leader)?.current_term;
    assert!(term >= 1);

    for id in members.iter() {
        let m = cluster.metrics(*id)?;
        if *id == leader {
            assert_eq!(ServerState::Leader, m.server_state);
        } else {
            assert_eq!(ServerState::Follower, m.server_state);
        }
        assert_eq!(Some(leader), m.current_leader);
    }

    tracing::info!("--- the blank entry of the leader is committed everywhere");
    {
        let last = cluster.metrics(leader)?.last_log_index;
        assert!(last >= 1);
        cluster.wait_applied(&members, last, timeout(), "blank entry").await?;
    }

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(5_000))
}

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use maplit::btreeset;
use memstore::Cmd;
use oneraft::Config;
use oneraft::Metrics;
use oneraft::NodeId;
use oneraft::Raft;
use oneraft::ServerState;
use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;

use crate::fixtures::ut_harness;
use crate::fixtures::TypedCluster;

#[derive(Debug, Default)]
struct Observed {
    samples: u64,

    /// The leader seen in each term.
    leaders: BTreeMap<u64, NodeId>,

    violations: Vec<String>,
}

/// Checks every metrics update of every node it watches:
/// `last_applied <= commit_index <= last_log_index`, and at most one leader
/// per term.
#[derive(Clone, Default)]
struct Checker {
    observed: Arc<Mutex<Observed>>,
}

impl Checker {
    fn watch(&self, raft: &Raft<Cmd>) -> JoinHandle<()> {
        let mut rx = raft.metrics();
        let checker = self.clone();

        tokio::spawn(async move {
            loop {
                let m = rx.borrow_and_update().clone();
                checker.check(&m);

                if m.running_state.is_err() {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn check(&self, m: &Metrics) {
        let mut o = self.observed.lock().unwrap();
        o.samples += 1;

        if !(m.last_applied <= m.commit_index
            && m.commit_index <= m.last_log_index)
        {
            o.violations.push(format!("n{} index order: {}", m.id, m));
        }

        if m.server_state == ServerState::Leader {
            let leader = *o.leaders.entry(m.current_term).or_insert(m.id);
            if leader != m.id {
                o.violations.push(format!(
                    "two leaders in term {}: n{} and n{}",
                    m.current_term, leader, m.id
                ));
            }
        }
    }
}

/// Index ordering and leader uniqueness hold on every node through a
/// partition, a heal, a compaction and a restart, with an apply queue that
/// is much shorter than the backlog.
#[tracing::instrument]
#[test_harness::test(harness = ut_harness)]
async fn invariants_under_churn() -> Result<()> {
    let config = Arc::new(
        Config {
            apply_queue_capacity: 2,
            max_payload_entries: 3,
            ..Default::default()
        }
        .validate()?,
    );
    let members = btreeset! {1,2,3};

    let checker = Checker::default();
    let mut watchers = vec![];

    let mut cluster = TypedCluster::new(config, members.clone());
    for id in members.iter().copied() {
        let raft = cluster.start(id).await?;
        watchers.push(checker.watch(&raft));
    }

    let leader = cluster.wait_for_leader(&members, timeout(), "init").await?;
    let last = cluster.submit_many(leader, "init", 10).await?;
    cluster.wait_applied(&members, last.index, timeout(), "init").await?;

    tracing::info!("--- isolate leader n{}", leader);
    let rest = members
        .iter()
        .copied()
        .filter(|x| *x != leader)
        .collect::<BTreeSet<_>>();
    cluster.network.partition(vec![btreeset! {leader}, rest.clone()]);

    for i in 0..3 {
        // Accepted by the isolated leader, never committed.
        cluster.raft(leader)?.submit(Cmd::set("lost", i)).await??;
    }

    let leader = cluster.wait_for_leader(&rest, timeout(), "majority").await?;
    let last = cluster.submit_many(leader, "majority", 10).await?;
    cluster.wait_applied(&rest, last.index, timeout(), "majority").await?;

    tracing::info!("--- heal");
    cluster.network.heal();

    let leader = cluster.wait_for_leader(&members, timeout(), "heal").await?;
    let last = cluster.submit_many(leader, "healed", 5).await?;
    cluster.wait_applied(&members, last.index, timeout(), "healed").await?;

    tracing::info!("--- compact on leader, restart a follower behind it");
    let follower =
        members.iter().copied().find(|x| *x != leader).unwrap_or_default();
    cluster.stop(follower).await?;

    cluster.snapshot(leader).await?;
    let last = cluster.submit_many(leader, "restart", 10).await?;

    let raft = cluster.start(follower).await?;
    watchers.push(checker.watch(&raft));

    cluster.wait_applied(&members, last.index, timeout(), "restart").await?;

    for w in watchers {
        w.abort();
    }

    let o = checker.observed.lock().unwrap();
    tracing::info!("observed {} samples, leaders: {:?}", o.samples, o.leaders);

    assert!(o.samples > 0);
    assert_eq!(Vec::<String>::new(), o.violations);

    Ok(())
}

fn timeout() -> Option<Duration> {
    Some(Duration::from_millis(10_000))
}

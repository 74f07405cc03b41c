mod logging;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use maplit::btreeset;
use memstore::Cmd;
use memstore::MemStateMachine;
use memstore::MemStorage;
use oneraft::errors::ForwardToLeader;
use oneraft::Config;
use oneraft::NodeId;
use oneraft::Raft;
use pseudonet::DirectNetwork;

use crate::logging::init_logging;

/// Run a three-node cluster in one process.
///
/// Config options are read from the command line, e.g.:
/// `hello --election-timeout-min 300 --election-timeout-max 600`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let g = init_logging("hello", "_log", "DEBUG");
    Box::leak(Box::new(g));

    let args = std::env::args().collect::<Vec<_>>();
    let args = args.iter().map(|x| x.as_str()).collect::<Vec<_>>();
    let config = Arc::new(Config::build(&args)?);

    let members = btreeset! {1, 2, 3};
    let network = DirectNetwork::<Cmd>::default();
    let mut state_machines = BTreeMap::<NodeId, MemStateMachine>::new();

    for id in members.iter().copied() {
        let sm = MemStateMachine::default();
        let raft = Raft::new(
            id,
            config.clone(),
            members.clone(),
            network.for_node(id),
            MemStorage::default(),
            sm.clone(),
        )
        .await?;

        network.add_peer(id, raft);
        state_machines.insert(id, sm);
    }

    let Some(n1) = network.get_peer(&1) else {
        return Err("node 1 is not found".into());
    };

    let write_res = n1.submit(Cmd::set("x", 1)).await?;
    println!(
        "submit to arbitrary node, there may not be a leader: {:?}",
        write_res
    );

    println!("sleeping for 1_000ms to wait for leader election");
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    let write_res = n1.submit(Cmd::set("x", 1)).await?;
    println!(
        "submit to arbitrary node, if it's not leader, \
        it should inform to forward to a leader: {:?}",
        write_res
    );

    // Find the leader
    let leader = match write_res {
        Err(ForwardToLeader {
            leader_id: Some(leader_id),
        }) => network.get_peer(&leader_id).unwrap_or(n1),
        _ => n1,
    };

    let mut last = None;
    for (k, v) in [("x", "1"), ("y", "2"), ("x", "3")] {
        let res = leader.submit(Cmd::set(k, v)).await?;
        println!("submit to leader: {:?}", res);
        if let Ok(log_id) = res {
            last = Some(log_id);
        }
    }

    if let Some(log_id) = last {
        for id in members.iter() {
            let Some(raft) = network.get_peer(id) else {
                continue;
            };
            raft.wait(Some(Duration::from_millis(1_000)))
                .applied_index_at_least(log_id.index, "apply all")
                .await?;
        }
    }

    for (id, sm) in state_machines.iter() {
        println!("n{} state machine: {:?}", id, sm.state());
    }

    for id in members.iter() {
        if let Some(raft) = network.remove_peer(*id) {
            raft.shutdown().await?;
        }
    }

    Ok(())
}

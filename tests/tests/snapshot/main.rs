#[path = "../fixtures/mod.rs"]
mod fixtures;

mod t20_install_snapshot_to_lagging_follower;

#[path = "../fixtures/mod.rs"]
mod fixtures;

mod t10_replicate_in_batches;
mod t20_partition_and_heal;
mod t30_lagging_network;
mod t40_invariants_under_churn;

#[path = "../fixtures/mod.rs"]
mod fixtures;

mod t10_elect_one_leader;
mod t40_stale_leader_steps_down;

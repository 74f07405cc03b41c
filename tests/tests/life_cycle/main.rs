#[path = "../fixtures/mod.rs"]
mod fixtures;

mod t10_follower_restart;
mod t40_shutdown;

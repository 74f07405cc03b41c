#[path = "../fixtures/mod.rs"]
mod fixtures;

mod t20_trigger_elect;

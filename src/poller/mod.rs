// src/poller/mod.rs
mod fleet;

pub use fleet::{FleetPoller, PollResult};

// src/controller/mod.rs
mod cycle;

pub use cycle::{CycleReport, FleetController};

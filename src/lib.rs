// src/lib.rs
pub mod config;
pub mod controller;
pub mod deploy;
pub mod health;
pub mod metrics;
pub mod nginx;
pub mod poller;
pub mod probe;
pub mod registry;
pub mod server;

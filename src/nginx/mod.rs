// src/nginx/mod.rs
mod generator;

pub use generator::{generate, plan, render, upstream_host, UpstreamPlan};

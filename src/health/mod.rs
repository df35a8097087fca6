// src/health/mod.rs
mod evaluator;
mod resolver;

pub use evaluator::{block_distance, is_caught_up, Evaluation, HealthEvaluator, NodeHealth};
pub use resolver::{resolve_reference_height, ReferenceHeight, ReferenceSource};

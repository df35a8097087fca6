// src/probe/mod.rs
mod prober;

pub use prober::{parse_height_response, parse_hex_height, NodeProber, ProbeError, ProbeOutcome};

use async_trait::async_trait;

/// Issues a single height query against one node. Implementations never fail:
/// any error is logged and reported as an outcome without a height.
#[async_trait]
pub trait HeightProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

// src/health/evaluator.rs
use super::resolver::{resolve_reference_height, ReferenceHeight};
use crate::poller::PollResult;
use tracing::{debug, info, warn};

/// Signed block distance of `height` behind `reference`. Negative when the
/// node is ahead.
pub fn block_distance(reference: u64, height: u64) -> i128 {
    i128::from(reference) - i128::from(height)
}

/// A node is caught up when it is strictly less than `tolerance` blocks
/// behind the reference. No height or no reference means not caught up.
pub fn is_caught_up(reference: Option<u64>, height: Option<u64>, tolerance: u64) -> bool {
    match (reference, height) {
        (Some(reference), Some(height)) => {
            block_distance(reference, height) < i128::from(tolerance)
        }
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHealth {
    pub url: String,
    pub is_leader: bool,
    /// Height reported this cycle, if any.
    pub observed_height: Option<u64>,
    /// Height to persist: this cycle's, or the last known one on failure.
    pub height: Option<u64>,
    pub latency_ms: u64,
    pub was_healthy: bool,
    pub is_healthy: bool,
}

impl NodeHealth {
    pub fn transitioned(&self) -> bool {
        self.was_healthy != self.is_healthy
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub reference: Option<ReferenceHeight>,
    pub nodes: Vec<NodeHealth>,
    /// Set when any node's health differs from the previous cycle.
    pub needs_reconfiguration: bool,
}

impl Evaluation {
    pub fn reference_height(&self) -> Option<u64> {
        self.reference.as_ref().map(|r| r.height)
    }

    pub fn healthy_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_healthy).count()
    }
}

#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    tolerance: u64,
}

impl HealthEvaluator {
    pub fn new(tolerance: u64) -> Self {
        Self { tolerance }
    }

    pub fn evaluate(&self, results: &[PollResult]) -> Evaluation {
        let reference = resolve_reference_height(results);
        let reference_height = reference.as_ref().map(|r| r.height);

        match &reference {
            Some(r) => debug!("Reference height {} ({:?})", r.height, r.source),
            None => warn!("No backend reported a height; marking whole fleet unhealthy"),
        }

        let nodes: Vec<NodeHealth> = results
            .iter()
            .map(|result| {
                let is_healthy = is_caught_up(reference_height, result.height, self.tolerance);
                let node = NodeHealth {
                    url: result.url.clone(),
                    is_leader: result.is_leader,
                    observed_height: result.height,
                    height: result.height.or(result.previous_height),
                    latency_ms: result.latency_ms,
                    was_healthy: result.was_healthy,
                    is_healthy,
                };

                if node.transitioned() {
                    if node.is_healthy {
                        info!("Backend {} is now healthy at height {:?}", node.url, node.observed_height);
                    } else {
                        warn!(
                            "Backend {} is now unhealthy (height {:?}, reference {:?})",
                            node.url, node.observed_height, reference_height
                        );
                    }
                }
                node
            })
            .collect();

        let needs_reconfiguration = nodes.iter().any(NodeHealth::transitioned);

        Evaluation {
            reference,
            nodes,
            needs_reconfiguration,
        }
    }
}

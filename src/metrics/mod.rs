// src/metrics/mod.rs
mod collector;
mod log_sink;

pub use collector::PrometheusSink;
pub use log_sink::LogSink;

use crate::health::{block_distance, Evaluation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const NODE_HEIGHT: &str = "node_block_height";
pub const NODE_LATENCY: &str = "node_probe_latency";
pub const HEALTHY_NODES: &str = "healthy_node_count";
pub const NODE_DISTANCE: &str = "node_block_distance";

pub const NODE_URL_TAG: &str = "node_url";
pub const STACK_TAG: &str = "stack";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricUnit {
    None,
    Milliseconds,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

impl MetricPoint {
    fn new(name: &str, value: f64, unit: MetricUnit, timestamp: DateTime<Utc>, tag: (&str, &str)) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit,
            timestamp,
            tags: vec![Tag {
                name: tag.0.to_string(),
                value: tag.1.to_string(),
            }],
        }
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics sink rejected batch: {0}")]
    Rejected(String),
}

/// Time-series destination. One batch is emitted per poll cycle.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn emit(&self, points: Vec<MetricPoint>) -> Result<(), SinkError>;
}

/// Project a cycle's evaluation into metric points.
///
/// Nodes without a height this cycle get no height, latency or distance
/// point. Distance points are only produced for non-leaders, and only when a
/// reference height was resolved.
pub fn project_points(evaluation: &Evaluation, stack_name: &str, now: DateTime<Utc>) -> Vec<MetricPoint> {
    let observed: Vec<(&str, u64, u64, bool)> = evaluation
        .nodes
        .iter()
        .filter_map(|n| n.observed_height.map(|h| (n.url.as_str(), h, n.latency_ms, n.is_leader)))
        .collect();

    let mut points = Vec::with_capacity(observed.len() * 3 + 1);

    points.extend(observed.iter().map(|(url, height, _, _)| {
        MetricPoint::new(NODE_HEIGHT, *height as f64, MetricUnit::None, now, (NODE_URL_TAG, *url))
    }));
    points.extend(observed.iter().map(|(url, _, latency_ms, _)| {
        MetricPoint::new(
            NODE_LATENCY,
            *latency_ms as f64,
            MetricUnit::Milliseconds,
            now,
            (NODE_URL_TAG, *url),
        )
    }));
    points.push(MetricPoint::new(
        HEALTHY_NODES,
        evaluation.healthy_count() as f64,
        MetricUnit::Count,
        now,
        (STACK_TAG, stack_name),
    ));

    if let Some(reference) = evaluation.reference_height() {
        points.extend(
            observed
                .iter()
                .filter(|(_, _, _, is_leader)| !is_leader)
                .map(|(url, height, _, _)| {
                    MetricPoint::new(
                        NODE_DISTANCE,
                        block_distance(reference, *height) as f64,
                        MetricUnit::None,
                        now,
                        (NODE_URL_TAG, *url),
                    )
                }),
        );
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthEvaluator, NodeHealth};
    use crate::poller::PollResult;

    fn result(url: &str, is_leader: bool, height: Option<u64>) -> PollResult {
        PollResult {
            url: url.to_string(),
            previous_height: height,
            height,
            latency_ms: 100,
            is_leader,
            was_healthy: true,
        }
    }

    fn names(points: &[MetricPoint]) -> Vec<(&str, Option<&str>, f64)> {
        points
            .iter()
            .map(|p| {
                (
                    p.name.as_str(),
                    p.tag(NODE_URL_TAG).or(p.tag(STACK_TAG)),
                    p.value,
                )
            })
            .collect()
    }

    #[test]
    fn test_points_for_steady_fleet() {
        let evaluation = HealthEvaluator::new(10).evaluate(&[
            result("http://url2", false, Some(25)),
            result("http://url1", false, Some(25)),
        ]);

        let points = project_points(&evaluation, "jsonrpc-proxy-dev", Utc::now());

        assert_eq!(
            names(&points),
            vec![
                (NODE_HEIGHT, Some("http://url2"), 25.0),
                (NODE_HEIGHT, Some("http://url1"), 25.0),
                (NODE_LATENCY, Some("http://url2"), 100.0),
                (NODE_LATENCY, Some("http://url1"), 100.0),
                (HEALTHY_NODES, Some("jsonrpc-proxy-dev"), 2.0),
                (NODE_DISTANCE, Some("http://url2"), 0.0),
                (NODE_DISTANCE, Some("http://url1"), 0.0),
            ]
        );
        assert_eq!(points[2].unit, MetricUnit::Milliseconds);
        assert_eq!(points[4].unit, MetricUnit::Count);
    }

    #[test]
    fn test_failed_nodes_and_leader_are_skipped() {
        let evaluation = HealthEvaluator::new(10).evaluate(&[
            result("http://leader", true, Some(10)),
            result("http://ahead", false, Some(14)),
            result("http://down", false, None),
        ]);

        let points = project_points(&evaluation, "stack", Utc::now());
        let distances: Vec<_> = names(&points)
            .into_iter()
            .filter(|(name, _, _)| *name == NODE_DISTANCE)
            .collect();

        assert_eq!(distances, vec![(NODE_DISTANCE, Some("http://ahead"), -4.0)]);
        assert!(points.iter().all(|p| p.tag(NODE_URL_TAG) != Some("http://down")));
    }

    #[test]
    fn test_no_reference_emits_only_healthy_count() {
        let evaluation = Evaluation {
            reference: None,
            nodes: vec![NodeHealth {
                url: "http://down".to_string(),
                is_leader: false,
                observed_height: None,
                height: Some(7),
                latency_ms: 2000,
                was_healthy: true,
                is_healthy: false,
            }],
            needs_reconfiguration: true,
        };

        let points = project_points(&evaluation, "stack", Utc::now());

        assert_eq!(names(&points), vec![(HEALTHY_NODES, Some("stack"), 0.0)]);
    }
}

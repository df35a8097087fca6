// src/metrics/collector.rs
use super::{
    MetricPoint, MetricsSink, SinkError, HEALTHY_NODES, NODE_DISTANCE, NODE_HEIGHT, NODE_LATENCY,
    NODE_URL_TAG, STACK_TAG,
};
use async_trait::async_trait;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Keeps the latest cycle's points as Prometheus gauges.
pub struct PrometheusSink {
    registry: Registry,

    // Per-node gauges
    pub node_block_height: GaugeVec,
    pub node_probe_latency_ms: GaugeVec,
    pub node_block_distance: GaugeVec,

    // Fleet gauges
    pub healthy_nodes: GaugeVec,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, SinkError> {
        let registry = Registry::new();

        let node_block_height = GaugeVec::new(
            Opts::new("fleet_node_block_height", "Last block height reported by the node"),
            &[NODE_URL_TAG],
        )?;
        registry.register(Box::new(node_block_height.clone()))?;

        let node_probe_latency_ms = GaugeVec::new(
            Opts::new(
                "fleet_node_probe_latency_ms",
                "eth_blockNumber response time in milliseconds",
            ),
            &[NODE_URL_TAG],
        )?;
        registry.register(Box::new(node_probe_latency_ms.clone()))?;

        let node_block_distance = GaugeVec::new(
            Opts::new(
                "fleet_node_block_distance",
                "Blocks behind the reference height (negative when ahead)",
            ),
            &[NODE_URL_TAG],
        )?;
        registry.register(Box::new(node_block_distance.clone()))?;

        let healthy_nodes = GaugeVec::new(
            Opts::new("fleet_healthy_nodes", "Number of healthy nodes"),
            &[STACK_TAG],
        )?;
        registry.register(Box::new(healthy_nodes.clone()))?;

        Ok(Self {
            registry,
            node_block_height,
            node_probe_latency_ms,
            node_block_distance,
            healthy_nodes,
        })
    }

    pub fn gather(&self) -> Result<Vec<u8>, SinkError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    fn gauge_for(&self, name: &str) -> Option<(&GaugeVec, &'static str)> {
        match name {
            NODE_HEIGHT => Some((&self.node_block_height, NODE_URL_TAG)),
            NODE_LATENCY => Some((&self.node_probe_latency_ms, NODE_URL_TAG)),
            NODE_DISTANCE => Some((&self.node_block_distance, NODE_URL_TAG)),
            HEALTHY_NODES => Some((&self.healthy_nodes, STACK_TAG)),
            _ => None,
        }
    }
}

#[async_trait]
impl MetricsSink for PrometheusSink {
    async fn emit(&self, points: Vec<MetricPoint>) -> Result<(), SinkError> {
        // Each batch is a full cycle; drop series for nodes that did not report.
        self.node_block_height.reset();
        self.node_probe_latency_ms.reset();
        self.node_block_distance.reset();

        let mut skipped = Vec::new();
        for point in &points {
            let Some((gauge, label)) = self.gauge_for(&point.name) else {
                skipped.push(point.name.clone());
                continue;
            };
            let Some(value) = point.tag(label) else {
                skipped.push(point.name.clone());
                continue;
            };
            gauge.with_label_values(&[value]).set(point.value);
        }

        if !skipped.is_empty() {
            return Err(SinkError::Rejected(format!(
                "unrecognised points: {}",
                skipped.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricUnit, Tag};
    use chrono::Utc;

    fn point(name: &str, tag: (&str, &str), value: f64) -> MetricPoint {
        MetricPoint {
            name: name.to_string(),
            value,
            unit: MetricUnit::None,
            timestamp: Utc::now(),
            tags: vec![Tag {
                name: tag.0.to_string(),
                value: tag.1.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_emit_and_gather() {
        let sink = PrometheusSink::new().unwrap();
        sink.emit(vec![
            point(NODE_HEIGHT, (NODE_URL_TAG, "http://a"), 25.0),
            point(NODE_DISTANCE, (NODE_URL_TAG, "http://a"), -3.0),
            point(HEALTHY_NODES, (STACK_TAG, "prod"), 1.0),
        ])
        .await
        .unwrap();

        let text = String::from_utf8(sink.gather().unwrap()).unwrap();
        assert!(text.contains(r#"fleet_node_block_height{node_url="http://a"} 25"#));
        assert!(text.contains(r#"fleet_node_block_distance{node_url="http://a"} -3"#));
        assert!(text.contains(r#"fleet_healthy_nodes{stack="prod"} 1"#));
    }

    #[tokio::test]
    async fn test_stale_nodes_are_dropped() {
        let sink = PrometheusSink::new().unwrap();
        sink.emit(vec![point(NODE_HEIGHT, (NODE_URL_TAG, "http://a"), 25.0)])
            .await
            .unwrap();
        sink.emit(vec![point(NODE_HEIGHT, (NODE_URL_TAG, "http://b"), 26.0)])
            .await
            .unwrap();

        let text = String::from_utf8(sink.gather().unwrap()).unwrap();
        assert!(!text.contains("http://a"));
        assert!(text.contains("http://b"));
    }

    #[tokio::test]
    async fn test_unknown_point_is_rejected() {
        let sink = PrometheusSink::new().unwrap();
        let result = sink
            .emit(vec![point("something_else", (NODE_URL_TAG, "http://a"), 1.0)])
            .await;
        assert!(matches!(result, Err(SinkError::Rejected(_))));
    }
}

// src/metrics/log_sink.rs
use super::{MetricPoint, MetricsSink, SinkError};
use async_trait::async_trait;

/// Writes every point to the log. Used when no time-series backend is wired.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl MetricsSink for LogSink {
    async fn emit(&self, points: Vec<MetricPoint>) -> Result<(), SinkError> {
        for point in &points {
            let tags = point
                .tags
                .iter()
                .map(|t| format!("{}={}", t.name, t.value))
                .collect::<Vec<_>>()
                .join(",");
            tracing::info!(
                target: "rpc_fleet_controller::metrics",
                name = %point.name,
                value = point.value,
                unit = ?point.unit,
                tags = %tags,
                timestamp = %point.timestamp.to_rfc3339(),
                "metric"
            );
        }
        Ok(())
    }
}

// src/deploy/mod.rs
mod file;
mod webhook;

pub use file::FilePublisher;
pub use webhook::WebhookTrigger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Webhook request failed: {0}")]
    Webhook(#[from] reqwest::Error),

    #[error("Deployment endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Signal sent to the deployment path when the healthy set changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconfigureRequest {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub healthy_nodes: usize,
    /// Freshly generated proxy configuration.
    pub config: String,
}

impl ReconfigureRequest {
    pub fn new(config: String, healthy_nodes: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            healthy_nodes,
            config,
        }
    }
}

/// External deployment path. Retries, if any, are its own business.
#[async_trait]
pub trait DeploymentTrigger: Send + Sync {
    async fn reconfigure(&self, request: ReconfigureRequest) -> Result<(), DeployError>;
}

/// Runs each stage in order, stopping at the first failure.
pub struct DeployPipeline {
    stages: Vec<Arc<dyn DeploymentTrigger>>,
}

impl DeployPipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: Arc<dyn DeploymentTrigger>) -> Self {
        self.stages.push(stage);
        self
    }
}

impl Default for DeployPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentTrigger for DeployPipeline {
    async fn reconfigure(&self, request: ReconfigureRequest) -> Result<(), DeployError> {
        for stage in &self.stages {
            stage.reconfigure(request.clone()).await?;
        }
        Ok(())
    }
}

// src/deploy/file.rs
use super::{DeployError, DeploymentTrigger, ReconfigureRequest};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes the generated config to a file the proxy (or its deploy tooling)
/// watches. Unchanged content is not rewritten.
pub struct FilePublisher {
    path: PathBuf,
    last_published: ArcSwapOption<String>,
}

impl FilePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_published: ArcSwapOption::empty(),
        }
    }

    async fn is_current(&self, config: &str) -> bool {
        if let Some(last) = self.last_published.load_full() {
            return last.as_str() == config;
        }
        match tokio::fs::read_to_string(&self.path).await {
            Ok(existing) => existing == config,
            Err(_) => false,
        }
    }
}

#[async_trait]
impl DeploymentTrigger for FilePublisher {
    async fn reconfigure(&self, request: ReconfigureRequest) -> Result<(), DeployError> {
        if self.is_current(&request.config).await {
            debug!("Config at {} already up to date", self.path.display());
            self.last_published.store(Some(Arc::new(request.config)));
            return Ok(());
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "nginx.conf".to_string());
        let tmp = self.path.with_file_name(format!(".{}.{}.tmp", file_name, request.id));

        tokio::fs::write(&tmp, request.config.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(
            request_id = %request.id,
            healthy_nodes = request.healthy_nodes,
            "Published proxy config to {}",
            self.path.display()
        );
        self.last_published.store(Some(Arc::new(request.config)));
        Ok(())
    }
}

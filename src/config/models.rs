// src/config/models.rs
use crate::registry::validate_backend_url;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TOLERANCE: u64 = 10;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub poll: PollConfig,
    pub metrics: MetricsConfig,
    pub admin: AdminConfig,
    pub deploy: DeployConfig,
    /// Backends seeded into the registry at start-up.
    pub backends: Vec<SeedBackend>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be greater than zero");
        }
        if self.poll.probe_timeout_ms == 0 {
            bail!("poll.probe_timeout_ms must be greater than zero");
        }
        if self.metrics.stack_name.trim().is_empty() {
            bail!("metrics.stack_name must not be empty");
        }
        if !self.admin.metrics_path.starts_with('/') {
            bail!("admin.metrics_path must start with '/'");
        }
        self.admin
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid admin.bind_address {}", self.admin.bind_address))?;

        if let Some(webhook) = &self.deploy.webhook_url {
            Url::parse(webhook)
                .with_context(|| format!("Invalid deploy.webhook_url {}", webhook))?;
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            validate_backend_url(&backend.url)
                .with_context(|| format!("Invalid backend url {}", backend.url))?;
            if !seen.insert(backend.url.as_str()) {
                bail!("Duplicate backend url {}", backend.url);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// Maximum block distance behind the reference height that still counts
    /// as caught up (exclusive).
    pub tolerance: u64,
    /// 0 means one probe slot per backend.
    pub max_concurrent_probes: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            tolerance: DEFAULT_TOLERANCE,
            max_concurrent_probes: 0,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Prometheus,
    Log,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub stack_name: String,
    pub sink: SinkKind,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stack_name: "jsonrpc-proxy".to_string(),
            sink: SinkKind::Prometheus,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub bind_address: String,
    pub metrics_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    pub output_path: String,
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            output_path: "nginx.conf".to_string(),
            webhook_url: None,
            webhook_timeout_secs: 5,
        }
    }
}

impl DeployConfig {
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedBackend {
    pub url: String,
    #[serde(default)]
    pub is_leader: bool,
}

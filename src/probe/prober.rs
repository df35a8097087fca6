// src/probe/prober.rs
use super::HeightProbe;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid block height {0:?}")]
    InvalidHeight(String),
}

/// Result of one height query. `height` is `None` for any failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub height: Option<u64>,
    pub latency_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Queries `eth_blockNumber` on a single node.
#[derive(Debug, Clone)]
pub struct NodeProber {
    client: Client,
    timeout: Duration,
}

impl NodeProber {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(concat!("rpc-fleet-controller/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch_height(&self, url: &str) -> Result<u64, ProbeError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": 1,
        });

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        // Nodes answer with either application/json or text/plain; both carry JSON.
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_height_response(&text)
    }
}

#[async_trait]
impl HeightProbe for NodeProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();
        let result = timeout(self.timeout, self.fetch_height(url)).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let height = match result {
            Ok(Ok(height)) => {
                debug!("Backend {} at height {} ({} ms)", url, height, latency_ms);
                Some(height)
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Failed to get block number");
                None
            }
            Err(_) => {
                let e = ProbeError::Timeout(self.timeout);
                warn!(url = %url, error = %e, "Failed to get block number");
                None
            }
        };

        ProbeOutcome { height, latency_ms }
    }
}

/// Extract the block height from a JSON-RPC response body.
pub fn parse_height_response(body: &str) -> Result<u64, ProbeError> {
    let response: RpcResponse =
        serde_json::from_str(body.trim()).map_err(|e| ProbeError::Malformed(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(ProbeError::Rpc(error.to_string()));
    }

    match response.result {
        Some(serde_json::Value::String(raw)) => parse_hex_height(&raw),
        Some(other) => Err(ProbeError::InvalidHeight(other.to_string())),
        None => Err(ProbeError::Malformed("missing result".to_string())),
    }
}

/// Parse a base-16 quantity such as `0x1b4`. The prefix is optional.
pub fn parse_hex_height(raw: &str) -> Result<u64, ProbeError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProbeError::InvalidHeight(raw.to_string()));
    }

    u64::from_str_radix(digits, 16).map_err(|_| ProbeError::InvalidHeight(raw.to_string()))
}

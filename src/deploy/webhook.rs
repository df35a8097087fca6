// src/deploy/webhook.rs
use super::{DeployError, DeploymentTrigger, ReconfigureRequest};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Hands the request to an HTTP deployment endpoint, which performs the
/// rolling redeploy of the proxy.
pub struct WebhookTrigger {
    client: Client,
    url: String,
}

impl WebhookTrigger {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeployError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeploymentTrigger for WebhookTrigger {
    async fn reconfigure(&self, request: ReconfigureRequest) -> Result<(), DeployError> {
        tracing::info!(request_id = %request.id, "Triggering update of service via {}", self.url);

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

//! # HTTP Webhook Forwarder
//!
//! [`WebhookForwarder`] that POSTs the payload to a fixed URL with `reqwest`.

use crate::forwarder::{ForwardError, ForwardResponse, WebhookForwarder};
use async_trait::async_trait;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "http_forwarder_tests.rs"]
mod tests;

/// Clay webhook source receiving the survey payloads
pub const DEFAULT_WEBHOOK_URL: &str = "https://api.clay.com/v3/sources/webhook/pull-in-data-from-a-webhook-8a82cda5-b61a-4928-ae06-ba8fb644c231";

/// Forwarder for a single destination URL
#[derive(Debug, Clone)]
pub struct HttpWebhookForwarder {
    client: reqwest::Client,
    destination: url::Url,
}

impl HttpWebhookForwarder {
    pub fn new(destination: &str) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ForwardError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Self::with_client(client, destination)
    }

    pub fn with_client(client: reqwest::Client, destination: &str) -> Result<Self, ForwardError> {
        let destination =
            url::Url::parse(destination).map_err(|e| ForwardError::InvalidDestination {
                url: destination.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            destination,
        })
    }

    pub fn destination(&self) -> &url::Url {
        &self.destination
    }
}

#[async_trait]
impl WebhookForwarder for HttpWebhookForwarder {
    #[instrument(skip(self, payload), fields(destination = %self.destination.host_str().unwrap_or_default()))]
    async fn forward(&self, payload: &serde_json::Value) -> Result<ForwardResponse, ForwardError> {
        let response = self
            .client
            .post(self.destination.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| ForwardError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ForwardError::Transport {
                message: format!("Failed to read response body: {}", e),
            })?;

        let body: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| ForwardError::InvalidResponse {
                status,
                message: format!("Response body is not JSON: {}", e),
            })?;

        debug!(status, "Webhook destination responded");
        Ok(ForwardResponse { status, body })
    }
}

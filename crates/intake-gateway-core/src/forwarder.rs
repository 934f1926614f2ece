//! # Webhook Forwarder
//!
//! Pass-through of opaque JSON payloads to a fixed webhook destination.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;

/// Outbound side of the JSON proxy
///
/// Implementations send the payload unmodified and hand back whatever the
/// destination answered. No retry is attempted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookForwarder: Send + Sync {
    /// Forward a payload and return the destination's status and JSON body
    async fn forward(&self, payload: &serde_json::Value) -> Result<ForwardResponse, ForwardError>;
}

/// Destination response, passed back to the caller unchanged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardResponse {
    /// HTTP status returned by the destination
    pub status: u16,

    /// Parsed JSON body returned by the destination
    pub body: serde_json::Value,
}

/// Failures while talking to the webhook destination
#[derive(Debug, Clone, Error)]
pub enum ForwardError {
    #[error("Invalid destination URL {url}: {message}")]
    InvalidDestination { url: String, message: String },

    #[error("Webhook request failed: {message}")]
    Transport { message: String },

    #[error("Webhook returned an unusable response (status {status}): {message}")]
    InvalidResponse { status: u16, message: String },
}

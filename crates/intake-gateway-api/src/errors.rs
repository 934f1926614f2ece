//! Error types for the HTTP service
//!
//! Response bodies are always `{"error": "<message>"}`. Messages are fixed per
//! variant; the underlying cause is logged and never returned to the client.

use crate::transport::Transport;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use intake_gateway_core::{ForwardError, StorageError, StorageKey, UploadError, ValidationError};
use tracing::{error, warn};

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// ============================================================================
// Upload Errors
// ============================================================================

/// Upload handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: missing or unsafe session id, empty file, unreadable form,
///   any other rejected field
/// - `413 Payload Too Large`: body over `server.max_body_size`
/// - `415 Unsupported Media Type`: anything other than `application/pdf`
/// - `500 Internal Server Error`: storage write, URL generation or staging failure
#[derive(Debug, thiserror::Error)]
pub enum UploadHandlerError {
    /// No session id in the place the transport expects it
    #[error("Missing session id ({transport:?} transport)")]
    MissingSessionId { transport: Transport },

    #[error("Invalid session id: {0}")]
    InvalidSessionId(ValidationError),

    /// Any other field the gateway rejected
    #[error("Invalid upload request: {0}")]
    InvalidRequest(ValidationError),

    /// File absent or empty
    #[error("Invalid PDF file")]
    InvalidFile,

    #[error("Unsupported content type: {actual}")]
    UnsupportedMediaType { actual: String },

    #[error("Malformed multipart form: {message}")]
    MalformedMultipart { message: String },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Storage write failed for {key}: {source}")]
    StorageWrite {
        key: StorageKey,
        #[source]
        source: StorageError,
    },

    /// The object was written but no retrieval URL could be produced
    #[error("URL generation failed for {key}: {source}")]
    UrlGeneration {
        key: StorageKey,
        #[source]
        source: StorageError,
    },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl UploadHandlerError {
    /// Classify a gateway failure for the transport that carried the request
    pub fn from_upload(error: UploadError, transport: Transport) -> Self {
        match error {
            UploadError::Validation(ValidationError::Required { ref field })
                if field == "session_id" =>
            {
                Self::MissingSessionId { transport }
            }
            UploadError::Validation(ValidationError::EmptyPayload { .. }) => Self::InvalidFile,
            UploadError::Validation(ValidationError::UnsupportedMediaType { actual, .. }) => {
                Self::UnsupportedMediaType { actual }
            }
            UploadError::Validation(other) if other.field() == "session_id" => {
                Self::InvalidSessionId(other)
            }
            UploadError::Validation(other) => Self::InvalidRequest(other),
            UploadError::StorageWrite { key, source } => Self::StorageWrite { key, source },
            UploadError::UrlGeneration { key, source } => Self::UrlGeneration { key, source },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSessionId { .. }
            | Self::InvalidSessionId(_)
            | Self::InvalidRequest(_)
            | Self::InvalidFile
            | Self::MalformedMultipart { .. } => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StorageWrite { .. } | Self::UrlGeneration { .. } | Self::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to the client
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingSessionId {
                transport: Transport::RawBinary,
            } => "Missing x-session-id header",
            Self::MissingSessionId {
                transport: Transport::Multipart,
            } => "Missing sessionId field",
            Self::InvalidSessionId(_) => "Invalid session id",
            Self::InvalidRequest(_) => "Invalid upload request",
            Self::InvalidFile => "Invalid PDF file",
            Self::UnsupportedMediaType { .. } => "Only application/pdf uploads are accepted",
            Self::MalformedMultipart { .. } => "Malformed multipart form",
            Self::PayloadTooLarge => "Payload too large",
            Self::StorageWrite { .. } => "Failed to upload PDF",
            Self::UrlGeneration { .. } => "Failed to generate signed URL",
            Self::InternalError { .. } => "Internal server error",
        }
    }
}

impl IntoResponse for UploadHandlerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "Upload request failed");
        } else {
            warn!(error = %self, status = %status, "Upload request rejected");
        }

        error_response(status, self.public_message())
    }
}

// ============================================================================
// Forwarder Errors
// ============================================================================

/// Webhook proxy handler errors
#[derive(Debug, thiserror::Error)]
pub enum ForwardHandlerError {
    #[error("Request body is empty")]
    MissingPayload,

    #[error("Request body is not valid JSON: {message}")]
    InvalidPayload { message: String },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Webhook forwarding failed: {0}")]
    Upstream(#[from] ForwardError),

    /// Upstream answered with a code that cannot be relayed
    #[error("Upstream returned unrepresentable status {status}")]
    InvalidUpstreamStatus { status: u16 },
}

impl ForwardHandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingPayload | Self::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) | Self::InvalidUpstreamStatus { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingPayload => "Missing JSON payload",
            Self::InvalidPayload { .. } => "Invalid JSON payload",
            Self::PayloadTooLarge => "Payload too large",
            Self::Upstream(_) | Self::InvalidUpstreamStatus { .. } => "Proxy request failed",
        }
    }
}

impl IntoResponse for ForwardHandlerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "Webhook proxy request failed");
        } else {
            warn!(error = %self, status = %status, "Webhook proxy request rejected");
        }

        error_response(status, self.public_message())
    }
}

// ============================================================================
// Service Errors
// ============================================================================

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A storage or forwarder adapter could not be constructed
    #[error("Failed to initialize {component}: {message}")]
    Initialization { component: String, message: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {message}")]
    Loading { message: String },
}

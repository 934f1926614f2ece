//! # Intake Gateway Core
//!
//! Domain logic for the intake gateway: validated PDF uploads into a storage
//! bucket and pass-through forwarding of JSON payloads to a webhook.
//!
//! ## Architecture
//!
//! - Business logic depends only on the [`StorageCapability`] and
//!   [`WebhookForwarder`] traits
//! - Infrastructure implementations live in [`adapters`] and are injected at startup
//! - Transport concerns (HTTP parsing, CORS headers) belong to the API crate; this
//!   crate only sees the normalized [`upload::UploadedFile`] shape
//!
//! ## Usage
//!
//! ```rust
//! use intake_gateway_core::{upload::sanitize_filename, SessionId};
//!
//! let session_id = SessionId::new("abc123".to_string()).unwrap();
//! assert_eq!(session_id.as_str(), "abc123");
//! assert_eq!(sanitize_filename(Some("../../etc/passwd"), "document.pdf"), "passwd");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod adapters;
pub mod forwarder;
pub mod origin;
pub mod storage;
pub mod upload;

pub use forwarder::{ForwardError, ForwardResponse, WebhookForwarder};
pub use origin::{OriginDecision, OriginPolicy};
pub use storage::{PutOptions, StorageCapability, StorageError, StoredObject};
pub use upload::{
    KeyScheme, RetrievalUrl, UploadError, UploadGateway, UploadPolicy, UploadReceipt,
    UploadRequest, UploadedFile, UrlPolicy,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// The only media type accepted by the upload gateway
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Maximum accepted length of a session identifier
pub const MAX_SESSION_ID_LENGTH: usize = 128;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Caller-supplied identifier used to namespace stored uploads
///
/// Session IDs are opaque and unauthenticated. The only guarantee this type
/// gives is that the value can be embedded in a storage key without escaping
/// its namespace: no path separators, no dot-segments, printable ASCII only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create new session ID with validation
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "session_id".to_string(),
            });
        }

        if value.len() > MAX_SESSION_ID_LENGTH {
            return Err(ValidationError::TooLong {
                field: "session_id".to_string(),
                max_length: MAX_SESSION_ID_LENGTH,
            });
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::InvalidCharacters {
                field: "session_id".to_string(),
                invalid_chars: "non-ASCII, control or whitespace".to_string(),
            });
        }

        if value.contains('/') || value.contains('\\') {
            return Err(ValidationError::InvalidFormat {
                field: "session_id".to_string(),
                message: "path separators are not allowed".to_string(),
            });
        }

        if value == "." || value == ".." {
            return Err(ValidationError::InvalidFormat {
                field: "session_id".to_string(),
                message: "dot segments are not allowed".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key inside the storage bucket
///
/// Built by [`upload::derive_storage_key`] from a validated [`SessionId`] and a
/// sanitized filename, so every segment is free of separators and dot-segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
    pub(crate) fn from_segments(segments: &[&str]) -> Self {
        Self(segments.join("/"))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments of the key
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Media Types
// ============================================================================

/// Check a declared `Content-Type` value against an expected media type
///
/// Parameters (`; charset=...`) are ignored and the comparison is
/// case-insensitive. An absent content type never matches.
pub fn media_type_matches(declared: Option<&str>, expected: &str) -> bool {
    declared
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

// ============================================================================
// Error Types
// ============================================================================

/// Input validation failures
///
/// These are always caused by the caller and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Field too long: {field} (max: {max_length})")]
    TooLong { field: String, max_length: usize },

    #[error("Invalid characters in {field}: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Empty payload: {field}")]
    EmptyPayload { field: String },

    #[error("Unsupported media type: expected {expected}, got {actual}")]
    UnsupportedMediaType { expected: String, actual: String },
}

impl ValidationError {
    /// Name of the field that failed validation
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::TooLong { field, .. }
            | Self::InvalidCharacters { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::EmptyPayload { field } => field,
            Self::UnsupportedMediaType { .. } => "content_type",
        }
    }
}

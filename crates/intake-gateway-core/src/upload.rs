//! # Upload Gateway
//!
//! Validated ingestion of untrusted PDF uploads.
//!
//! The gateway consumes a normalized [`UploadRequest`] produced by a transport
//! adapter, validates it in a fixed order, derives a deterministic storage key
//! and writes through the injected [`StorageCapability`]. The retrieval URL is
//! produced according to the configured [`UrlPolicy`].
//!
//! Validation order (first failure wins, no storage call is made):
//! 1. session identifier present and path-safe
//! 2. file present and non-empty
//! 3. content type equal to [`PDF_MEDIA_TYPE`]

use crate::storage::{PutOptions, StorageCapability, StorageError};
use crate::{media_type_matches, SessionId, StorageKey, ValidationError, PDF_MEDIA_TYPE};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;

/// Folder used by the [`KeyScheme::SessionDocument`] scheme
pub const DOCUMENT_PREFIX: &str = "business-pdfs";

/// Fallback name when the client supplies no usable filename
pub const DEFAULT_FILENAME: &str = "document.pdf";

/// One year, the validity window of signed retrieval URLs
pub const DEFAULT_SIGNED_URL_TTL_SECONDS: u64 = 60 * 60 * 24 * 365;

/// Cache-Control max-age hint attached to stored objects
pub const DEFAULT_CACHE_CONTROL_SECONDS: u64 = 3600;

// ============================================================================
// Request Types
// ============================================================================

/// File payload after transport-specific parsing
///
/// Both the raw-binary and multipart adapters produce this shape; nothing in
/// the gateway depends on which one was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File content
    pub bytes: Bytes,

    /// Declared content type (request header or multipart part header)
    pub content_type: Option<String>,

    /// Client-supplied filename, untrusted
    pub filename: Option<String>,
}

impl UploadedFile {
    pub fn new(bytes: Bytes, content_type: Option<String>, filename: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
            filename,
        }
    }
}

/// Everything the transport extracted from one upload request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    /// Raw session identifier, before validation
    pub session_id: Option<String>,

    /// Uploaded file, if the request carried one
    pub file: Option<UploadedFile>,
}

impl UploadRequest {
    pub fn new(session_id: Option<String>, file: Option<UploadedFile>) -> Self {
        Self { session_id, file }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// How a storage key is derived from the session identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyScheme {
    /// `business-pdfs/{session_id}.pdf`, one document per session
    #[default]
    SessionDocument,

    /// `{session_id}/{sanitized_filename}`, one folder per session
    SessionFolder,
}

/// How the retrieval URL is produced after a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum UrlPolicy {
    /// Time-limited signed URL
    Signed { expires_in_seconds: u64 },

    /// Permanent public URL
    Public,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::Signed {
            expires_in_seconds: DEFAULT_SIGNED_URL_TTL_SECONDS,
        }
    }
}

/// Deployment-wide upload behaviour
///
/// Exactly one key scheme, overwrite policy and URL policy is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    pub key_scheme: KeyScheme,

    /// Overwrite an existing object at the same key
    pub upsert: bool,

    pub url_policy: UrlPolicy,

    pub cache_control_seconds: u64,

    /// Name used when the client sends no usable filename
    pub default_filename: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            key_scheme: KeyScheme::SessionDocument,
            upsert: false,
            url_policy: UrlPolicy::default(),
            cache_control_seconds: DEFAULT_CACHE_CONTROL_SECONDS,
            default_filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

// ============================================================================
// Key Derivation
// ============================================================================

/// Reduce an untrusted filename to a single safe path segment
///
/// Everything up to the last `/` or `\` is discarded. Control characters are
/// dropped. An empty result, `.` or `..` falls back to `default_name`. The
/// function is idempotent.
///
/// # Examples
///
/// ```
/// use intake_gateway_core::upload::sanitize_filename;
///
/// assert_eq!(sanitize_filename(Some("../../etc/passwd"), "document.pdf"), "passwd");
/// assert_eq!(sanitize_filename(Some("C:\\reports\\q3.pdf"), "document.pdf"), "q3.pdf");
/// assert_eq!(sanitize_filename(None, "document.pdf"), "document.pdf");
/// ```
pub fn sanitize_filename(raw: Option<&str>, default_name: &str) -> String {
    let candidate = raw
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(|segment| {
            segment
                .chars()
                .filter(|c| !c.is_control())
                .collect::<String>()
        })
        .map(|segment| segment.trim().to_string())
        .unwrap_or_default();

    if candidate.is_empty() || candidate == "." || candidate == ".." {
        default_name.to_string()
    } else {
        candidate
    }
}

/// Derive the storage key for a session and sanitized filename
///
/// The same inputs always produce the same key.
pub fn derive_storage_key(
    scheme: KeyScheme,
    session_id: &SessionId,
    sanitized_filename: &str,
) -> StorageKey {
    match scheme {
        KeyScheme::SessionDocument => {
            let document = format!("{}.pdf", session_id.as_str());
            StorageKey::from_segments(&[DOCUMENT_PREFIX, &document])
        }
        KeyScheme::SessionFolder => {
            StorageKey::from_segments(&[session_id.as_str(), sanitized_filename])
        }
    }
}

// ============================================================================
// Results and Errors
// ============================================================================

/// Retrieval URL returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalUrl {
    Signed { url: String, expires_at: DateTime<Utc> },
    Public { url: String },
}

impl RetrievalUrl {
    pub fn url(&self) -> &str {
        match self {
            Self::Signed { url, .. } | Self::Public { url } => url,
        }
    }
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Key actually written
    pub stored_key: StorageKey,

    pub retrieval_url: RetrievalUrl,

    pub size_bytes: u64,
}

/// Upload failures
///
/// A failed write and a successful write followed by a failed URL request are
/// reported as different variants.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error("Upload rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to store {key}: {source}")]
    StorageWrite {
        key: StorageKey,
        #[source]
        source: StorageError,
    },

    #[error("Failed to create retrieval URL for {key}: {source}")]
    UrlGeneration {
        key: StorageKey,
        #[source]
        source: StorageError,
    },
}

/// Upload after validation, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub session_id: SessionId,
    pub key: StorageKey,
    pub bytes: Bytes,
}

// ============================================================================
// Gateway
// ============================================================================

/// Validated ingestion gateway for PDF uploads
#[derive(Clone)]
pub struct UploadGateway {
    storage: Arc<dyn StorageCapability>,
    policy: UploadPolicy,
}

impl UploadGateway {
    pub fn new(storage: Arc<dyn StorageCapability>, policy: UploadPolicy) -> Self {
        Self { storage, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate a request and derive its storage key without touching storage
    pub fn validate(&self, request: UploadRequest) -> Result<ValidatedUpload, ValidationError> {
        let raw_session_id = request.session_id.unwrap_or_default();
        let session_id = SessionId::new(raw_session_id)?;

        let file = request
            .file
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| ValidationError::EmptyPayload {
                field: "file".to_string(),
            })?;

        if !media_type_matches(file.content_type.as_deref(), PDF_MEDIA_TYPE) {
            return Err(ValidationError::UnsupportedMediaType {
                expected: PDF_MEDIA_TYPE.to_string(),
                actual: file
                    .content_type
                    .unwrap_or_else(|| "<none>".to_string()),
            });
        }

        let filename = sanitize_filename(file.filename.as_deref(), &self.policy.default_filename);
        let key = derive_storage_key(self.policy.key_scheme, &session_id, &filename);

        Ok(ValidatedUpload {
            session_id,
            key,
            bytes: file.bytes,
        })
    }

    /// Validate, store and produce a retrieval URL
    #[instrument(skip(self, request), fields(session_id, key))]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, UploadError> {
        let validated = self.validate(request).map_err(|e| {
            warn!(error = %e, "Upload failed validation");
            e
        })?;

        tracing::Span::current().record("session_id", validated.session_id.as_str());
        tracing::Span::current().record("key", validated.key.as_str());

        let options = PutOptions::new(
            PDF_MEDIA_TYPE,
            self.policy.cache_control_seconds,
            self.policy.upsert,
        );

        let stored = self
            .storage
            .put_object(&validated.key, validated.bytes, &options)
            .await
            .map_err(|source| {
                error!(
                    key = %validated.key,
                    error = %source,
                    transient = source.is_transient(),
                    "Storage write failed"
                );
                UploadError::StorageWrite {
                    key: validated.key.clone(),
                    source,
                }
            })?;

        let retrieval_url = match self.policy.url_policy {
            UrlPolicy::Signed { expires_in_seconds } => {
                let url = self
                    .storage
                    .create_signed_url(&stored.key, Duration::from_secs(expires_in_seconds))
                    .await
                    .map_err(|source| {
                        error!(key = %stored.key, error = %source, "Signed URL generation failed");
                        UploadError::UrlGeneration {
                            key: stored.key.clone(),
                            source,
                        }
                    })?;
                RetrievalUrl::Signed {
                    url,
                    expires_at: expiry_from_now(expires_in_seconds),
                }
            }
            UrlPolicy::Public => RetrievalUrl::Public {
                url: self.storage.public_url(&stored.key),
            },
        };

        info!(
            key = %stored.key,
            size_bytes = stored.size_bytes,
            "Upload stored"
        );

        Ok(UploadReceipt {
            stored_key: stored.key,
            retrieval_url,
            size_bytes: stored.size_bytes,
        })
    }
}

fn expiry_from_now(expires_in_seconds: u64) -> DateTime<Utc> {
    i64::try_from(expires_in_seconds)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

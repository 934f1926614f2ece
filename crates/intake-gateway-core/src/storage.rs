//! # Storage Capability
//!
//! Abstraction over the blob store that receives uploaded documents.
//!
//! The gateway treats storage as an opaque capability: write bytes under a
//! key, then ask for a way to retrieve them (signed or public URL).

use crate::StorageKey;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;

// ============================================================================
// Core Trait
// ============================================================================

/// Interface for the storage backend
///
/// # Examples
///
/// ```no_run
/// use intake_gateway_core::{PutOptions, StorageCapability, StorageError, StorageKey};
/// use std::time::Duration;
/// # async fn example(storage: &dyn StorageCapability, key: &StorageKey) -> Result<(), StorageError> {
/// let options = PutOptions::new("application/pdf", 3600, false);
/// let stored = storage.put_object(key, bytes::Bytes::from_static(b"%PDF-1.7"), &options).await?;
/// let url = storage.create_signed_url(&stored.key, Duration::from_secs(60)).await?;
/// println!("{} bytes available at {}", stored.size_bytes, url);
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageCapability: Send + Sync {
    /// Write an object
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] when an object already exists at the
    /// key and `options.upsert` is false. Any transport or backend failure is
    /// reported through the other variants.
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<StoredObject, StorageError>;

    /// Create a retrieval URL that stops working after `expires_in`
    async fn create_signed_url(
        &self,
        key: &StorageKey,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    /// Permanent public URL for an object
    ///
    /// Only meaningful when the bucket is public; no backend call is made.
    fn public_url(&self, key: &StorageKey) -> String;
}

// ============================================================================
// Supporting Types
// ============================================================================

/// Write options passed alongside the object bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    /// Content type recorded on the object
    pub content_type: String,

    /// Cache-Control max-age hint in seconds
    pub cache_control_seconds: u64,

    /// Replace an existing object instead of failing with a conflict
    pub upsert: bool,
}

impl PutOptions {
    pub fn new(content_type: &str, cache_control_seconds: u64, upsert: bool) -> Self {
        Self {
            content_type: content_type.to_string(),
            cache_control_seconds,
            upsert,
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Key the object was written under
    pub key: StorageKey,

    /// Number of bytes written
    pub size_bytes: u64,
}

// ============================================================================
// Error Types
// ============================================================================

/// Storage backend errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Object already exists: {key}")]
    Conflict { key: String },

    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Storage authentication failed: {message}")]
    Unauthorized { message: String },

    #[error("Invalid storage key {key}: {message}")]
    InvalidKey { key: String, message: String },

    #[error("Storage backend returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Storage connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Invalid storage response: {message}")]
    InvalidResponse { message: String },

    #[error("Storage configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal storage error: {message}")]
    InternalError { message: String },
}

impl StorageError {
    /// Check if error is transient and the operation could succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Upstream { status, .. } => *status >= 500 || *status == 429,
            Self::Conflict { .. }
            | Self::NotFound { .. }
            | Self::Unauthorized { .. }
            | Self::InvalidKey { .. }
            | Self::InvalidResponse { .. }
            | Self::Configuration { .. }
            | Self::InternalError { .. } => false,
        }
    }
}

//! # Supabase Storage Adapter
//!
//! [`StorageCapability`] backed by the Supabase Storage REST API.
//!
//! Endpoints used (relative to `{project_url}/storage/v1`):
//! - `POST /object/{bucket}/{key}` to upload, with `x-upsert` controlling overwrite
//! - `POST /object/sign/{bucket}/{key}` to mint a signed URL
//! - `/object/public/{bucket}/{key}` as the public URL of an object

use crate::storage::{PutOptions, StorageCapability, StorageError, StoredObject};
use crate::StorageKey;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(test)]
#[path = "supabase_storage_tests.rs"]
mod tests;

/// Default bucket for uploaded documents
pub const DEFAULT_BUCKET: &str = "ar-maturity-survey";

// ============================================================================
// Credentials
// ============================================================================

/// Privileged Supabase service-role key
///
/// The value is never included in Debug output, logs or serialized
/// configuration, and is zeroized when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ServiceRoleKey(String);

impl ServiceRoleKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the key for use in a request header
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ServiceRoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRoleKey")
            .field("length", &self.0.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Serialize for ServiceRoleKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ServiceRoleKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self)
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Connection settings for a Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseStorageConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub project_url: String,

    pub service_role_key: ServiceRoleKey,

    pub bucket: String,
}

/// Supabase Storage client
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    storage_url: String,
    service_role_key: ServiceRoleKey,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedUrlRequest {
    expires_in: u64,
}

impl SupabaseStorage {
    /// Create a client with its own HTTP connection pool
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] if the project URL does not
    /// parse, the key is empty or the bucket name is empty.
    pub fn new(config: SupabaseStorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Self::with_client(client, config)
    }

    /// Create a client sharing an existing `reqwest::Client`
    pub fn with_client(
        client: reqwest::Client,
        config: SupabaseStorageConfig,
    ) -> Result<Self, StorageError> {
        let project_url =
            url::Url::parse(&config.project_url).map_err(|e| StorageError::Configuration {
                message: format!("Invalid Supabase URL '{}': {}", config.project_url, e),
            })?;

        if config.service_role_key.is_empty() {
            return Err(StorageError::Configuration {
                message: "Supabase service role key is empty".to_string(),
            });
        }

        if config.bucket.trim().is_empty() {
            return Err(StorageError::Configuration {
                message: "Supabase bucket name is empty".to_string(),
            });
        }

        let storage_url = format!(
            "{}/storage/v1",
            project_url.as_str().trim_end_matches('/')
        );

        Ok(Self {
            client,
            storage_url,
            service_role_key: config.service_role_key,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `{bucket}/{key}` with every segment percent-encoded
    fn object_path(&self, key: &StorageKey) -> String {
        let encoded: Vec<String> = std::iter::once(self.bucket.as_str())
            .chain(key.segments())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        encoded.join("/")
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.service_role_key.expose_secret();
        request
            .header(header::AUTHORIZATION, format!("Bearer {}", key))
            .header("apikey", key)
    }

    async fn error_from_response(key: &StorageKey, response: reqwest::Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Older Storage API versions report duplicates as 400 with a "Duplicate" error body.
        let duplicate = status == StatusCode::CONFLICT
            || (status == StatusCode::BAD_REQUEST
                && (body.contains("Duplicate") || body.contains("already exists")));

        if duplicate {
            return StorageError::Conflict {
                key: key.to_string(),
            };
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized {
                message: body,
            },
            StatusCode::NOT_FOUND => StorageError::NotFound {
                key: key.to_string(),
            },
            _ => StorageError::Upstream {
                status: status.as_u16(),
                message: body,
            },
        }
    }
}

#[async_trait]
impl StorageCapability for SupabaseStorage {
    #[instrument(skip(self, body, options), fields(bucket = %self.bucket, size = body.len()))]
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<StoredObject, StorageError> {
        let endpoint = format!("{}/object/{}", self.storage_url, self.object_path(key));
        let size_bytes = body.len() as u64;

        let response = self
            .authorized(self.client.post(&endpoint))
            .header(header::CONTENT_TYPE, options.content_type.as_str())
            .header(
                header::CACHE_CONTROL,
                format!("max-age={}", options.cache_control_seconds),
            )
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let error = Self::error_from_response(key, response).await;
            warn!(key = %key, error = %error, "Supabase upload rejected");
            return Err(error);
        }

        debug!(key = %key, size_bytes, "Supabase upload accepted");
        Ok(StoredObject {
            key: key.clone(),
            size_bytes,
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn create_signed_url(
        &self,
        key: &StorageKey,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let endpoint = format!("{}/object/sign/{}", self.storage_url, self.object_path(key));

        let response = self
            .authorized(self.client.post(&endpoint))
            .json(&SignedUrlRequest {
                expires_in: expires_in.as_secs(),
            })
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(key, response).await);
        }

        let signed: SignedUrlResponse =
            response
                .json()
                .await
                .map_err(|e| StorageError::InvalidResponse {
                    message: format!("Failed to parse signed URL response: {}", e),
                })?;

        // The API returns a path relative to the storage root.
        Ok(format!("{}{}", self.storage_url, signed.signed_url))
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!(
            "{}/object/public/{}",
            self.storage_url,
            self.object_path(key)
        )
    }
}

//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use intake_gateway_core::adapters::{
    supabase_storage::DEFAULT_BUCKET, ServiceRoleKey, DEFAULT_WEBHOOK_URL,
};
use intake_gateway_core::origin::DEFAULT_ALLOWED_ORIGINS;
use intake_gateway_core::upload::{
    DEFAULT_CACHE_CONTROL_SECONDS, DEFAULT_FILENAME, DEFAULT_SIGNED_URL_TTL_SECONDS,
};
use intake_gateway_core::{KeyScheme, OriginPolicy, UploadPolicy, UrlPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Environment variable overriding `storage.supabase.url`
pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";

/// Environment variable overriding `storage.supabase.service_role_key`
pub const SUPABASE_SERVICE_ROLE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Environment variable overriding `storage.supabase.bucket`
pub const SUPABASE_BUCKET_VAR: &str = "SUPABASE_BUCKET";

/// Service configuration
///
/// Every section carries serde defaults, so an empty document deserializes
/// into a usable configuration apart from the Supabase credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Browser origin allow-list
    pub cors: CorsConfig,

    /// Storage backend selection and credentials
    pub storage: StorageConfig,

    /// Upload key, overwrite and URL policies
    pub upload: UploadConfig,

    /// Webhook forwarding destination
    pub forwarder: ForwarderConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Origin allow-list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
        }
    }
}

impl CorsConfig {
    pub fn policy(&self) -> OriginPolicy {
        OriginPolicy::new(&self.allowed_origins)
    }
}

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Supabase,

    /// Local directory, for development
    Filesystem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub supabase: SupabaseSettings,
    pub filesystem: FilesystemSettings,
}

/// Supabase project settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseSettings {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: Option<String>,

    /// Service-role key; redacted when the configuration is serialized
    pub service_role_key: Option<ServiceRoleKey>,

    pub bucket: String,
}

impl Default for SupabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            service_role_key: None,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemSettings {
    pub base_path: PathBuf,

    /// Base URL used to build retrieval URLs for stored files
    pub public_base_url: String,
}

impl FilesystemSettings {
    /// Route prefix the stored files are served under
    ///
    /// This is the path of `public_base_url` without a trailing slash, e.g.
    /// `/files`. `None` when the URL does not parse, has no path, or would
    /// shadow a gateway route.
    pub fn mount_path(&self) -> Option<String> {
        let url = url::Url::parse(&self.public_base_url).ok()?;
        let path = url.path().trim_end_matches('/');
        let reserved = ["/api", "/health", "/upload-pdf"];
        if path.is_empty()
            || reserved
                .iter()
                .any(|r| path == *r || path.starts_with(&format!("{}/", r)))
        {
            return None;
        }
        Some(path.to_string())
    }
}

impl Default for FilesystemSettings {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data/uploads"),
            public_base_url: "http://localhost:3000/files".to_string(),
        }
    }
}

/// Which retrieval URL an upload returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMode {
    #[default]
    Signed,
    Public,
}

/// Upload policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub key_scheme: KeyScheme,

    /// Overwrite an existing object at the same key
    pub upsert: bool,

    pub url_mode: UrlMode,

    /// Lifetime of signed URLs; ignored in public mode
    pub signed_url_ttl_seconds: u64,

    pub cache_control_seconds: u64,

    pub default_filename: String,

    /// Stage multipart file parts to this directory before storing them
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            key_scheme: KeyScheme::default(),
            upsert: false,
            url_mode: UrlMode::default(),
            signed_url_ttl_seconds: DEFAULT_SIGNED_URL_TTL_SECONDS,
            cache_control_seconds: DEFAULT_CACHE_CONTROL_SECONDS,
            default_filename: DEFAULT_FILENAME.to_string(),
            staging_dir: None,
        }
    }
}

impl UploadConfig {
    /// Gateway policy described by these settings
    pub fn policy(&self) -> UploadPolicy {
        let url_policy = match self.url_mode {
            UrlMode::Signed => UrlPolicy::Signed {
                expires_in_seconds: self.signed_url_ttl_seconds,
            },
            UrlMode::Public => UrlPolicy::Public,
        };

        UploadPolicy {
            key_scheme: self.key_scheme,
            upsert: self.upsert,
            url_policy,
            cache_control_seconds: self.cache_control_seconds,
            default_filename: self.default_filename.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Webhook URL receiving forwarded payloads
    pub destination_url: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            destination_url: DEFAULT_WEBHOOK_URL.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level used when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl ServiceConfig {
    /// Apply the conventional Supabase environment variables
    ///
    /// `lookup` is usually `|name| std::env::var(name).ok()`. Empty values are
    /// ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(SUPABASE_URL_VAR) {
            self.storage.supabase.url = Some(url);
        }

        if let Some(key) = non_empty(SUPABASE_SERVICE_ROLE_KEY_VAR) {
            self.storage.supabase.service_role_key = Some(ServiceRoleKey::new(key));
        }

        if let Some(bucket) = non_empty(SUPABASE_BUCKET_VAR) {
            self.storage.supabase.bucket = bucket;
        }
    }

    /// Check the configuration for values the service cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(index) = self
            .cors
            .allowed_origins
            .iter()
            .position(|origin| origin.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                message: format!("cors.allowed_origins[{}] is empty", index),
            });
        }

        if self.storage.provider == StorageProvider::Supabase {
            let url_missing = self
                .storage
                .supabase
                .url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty());
            if url_missing {
                return Err(ConfigError::Missing {
                    key: "storage.supabase.url".to_string(),
                });
            }

            let key_missing = self
                .storage
                .supabase
                .service_role_key
                .as_ref()
                .is_none_or(ServiceRoleKey::is_empty);
            if key_missing {
                return Err(ConfigError::Missing {
                    key: "storage.supabase.service_role_key".to_string(),
                });
            }

            if self.storage.supabase.bucket.trim().is_empty() {
                return Err(ConfigError::Missing {
                    key: "storage.supabase.bucket".to_string(),
                });
            }
        }

        if self.storage.provider == StorageProvider::Filesystem
            && self.storage.filesystem.mount_path().is_none()
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "storage.filesystem.public_base_url '{}' must be an absolute URL with a path that is not a gateway route",
                    self.storage.filesystem.public_base_url
                ),
            });
        }

        if self.upload.url_mode == UrlMode::Signed && self.upload.signed_url_ttl_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "upload.signed_url_ttl_seconds must be greater than zero".to_string(),
            });
        }

        let filename = self.upload.default_filename.trim();
        if filename.is_empty() {
            return Err(ConfigError::Missing {
                key: "upload.default_filename".to_string(),
            });
        }
        if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
            return Err(ConfigError::Invalid {
                message: format!(
                    "upload.default_filename '{}' must be a single path segment",
                    filename
                ),
            });
        }

        if let Err(e) = url::Url::parse(&self.forwarder.destination_url) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "forwarder.destination_url '{}' is not a valid URL: {}",
                    self.forwarder.destination_url, e
                ),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

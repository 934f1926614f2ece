//! # Filesystem Storage Adapter
//!
//! Local filesystem implementation of [`StorageCapability`] for development and testing.

use crate::storage::{PutOptions, StorageCapability, StorageError, StoredObject};
use crate::StorageKey;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

#[cfg(test)]
#[path = "filesystem_storage_tests.rs"]
mod tests;

/// Suffix of in-progress writes, which live next to their target
const TEMP_SUFFIX: &str = ".upload";

/// Filesystem-based storage
///
/// Objects are written as plain files below `base_path`, one directory per
/// key segment. URLs are built from `public_base_url`; signed URLs carry an
/// `expires` query parameter but are not enforced by anything.
///
/// # Examples
///
/// ```no_run
/// use intake_gateway_core::adapters::FilesystemStorage;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = FilesystemStorage::new(PathBuf::from("./data/uploads"), "http://localhost:3000/files").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl FilesystemStorage {
    /// Create filesystem storage rooted at `base_path`
    ///
    /// # Errors
    ///
    /// Returns error if the base directory cannot be created.
    pub async fn new(base_path: PathBuf, public_base_url: &str) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to create base directory: {}", e),
            })?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Read a stored object back
    pub async fn read_object(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        let path = self.object_path(key)?;
        let is_file = fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::InternalError {
                message: format!("Failed to read object: {}", e),
            }),
        }
    }

    /// Read an object addressed by its `/`-separated key, as it appears in
    /// the URLs built by this storage
    pub async fn read_key_path(&self, key_path: &str) -> Result<Bytes, StorageError> {
        let segments: Vec<&str> = key_path.split('/').collect();
        self.read_object(&StorageKey::from_segments(&segments)).await
    }

    /// Resolve a key to a path below the base directory
    fn object_path(&self, key: &StorageKey) -> Result<PathBuf, StorageError> {
        let mut path = self.base_path.clone();
        for segment in key.segments() {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('\\')
                || (segment.starts_with('.') && segment.ends_with(TEMP_SUFFIX))
            {
                return Err(StorageError::InvalidKey {
                    key: key.to_string(),
                    message: format!("unsafe segment '{}'", segment),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageCapability for FilesystemStorage {
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<StoredObject, StorageError> {
        let object_path = self.object_path(key)?;
        let parent = object_path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey {
                key: key.to_string(),
                message: "key has no parent directory".to_string(),
            })?;

        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to create directory structure: {}", e),
            })?;

        // Unique per write; object keys can never take this form.
        let temp_path = parent.join(format!(".{}{}", Uuid::new_v4(), TEMP_SUFFIX));
        let result = write_and_publish(key, &temp_path, &object_path, &body, options.upsert).await;
        remove_temp_file(&temp_path).await;
        result?;

        Ok(StoredObject {
            key: key.clone(),
            size_bytes: body.len() as u64,
        })
    }

    async fn create_signed_url(
        &self,
        key: &StorageKey,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let object_path = self.object_path(key)?;
        if !fs::try_exists(&object_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }

        let expires_at = Utc::now().timestamp().saturating_add(
            i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX),
        );
        Ok(format!("{}?expires={}", self.public_url(key), expires_at))
    }

    fn public_url(&self, key: &StorageKey) -> String {
        let encoded: Vec<String> = key
            .segments()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }
}

/// Write `body` to a fresh temp file, then move it into place
///
/// Without upsert the object is published with a hard link, which fails if
/// the key already exists, so concurrent writers to one key get exactly one
/// success.
async fn write_and_publish(
    key: &StorageKey,
    temp_path: &Path,
    object_path: &Path,
    body: &[u8],
    upsert: bool,
) -> Result<(), StorageError> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await
        .map_err(|e| StorageError::InternalError {
            message: format!("Failed to create temp file: {}", e),
        })?;

    file.write_all(body)
        .await
        .map_err(|e| StorageError::InternalError {
            message: format!("Failed to write object: {}", e),
        })?;

    file.sync_all()
        .await
        .map_err(|e| StorageError::InternalError {
            message: format!("Failed to flush file: {}", e),
        })?;
    drop(file);

    if upsert {
        fs::rename(temp_path, object_path)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to move object into place: {}", e),
            })
    } else {
        match fs::hard_link(temp_path, object_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StorageError::Conflict {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::InternalError {
                message: format!("Failed to publish object: {}", e),
            }),
        }
    }
}

/// Best-effort cleanup; after a rename the file is already gone
async fn remove_temp_file(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

//! Response types for the API.

use chrono::{DateTime, Utc};
use intake_gateway_core::{RetrievalUrl, UploadReceipt};
use serde::{Deserialize, Serialize};

/// Success message of a signed-URL upload
pub const UPLOAD_SUCCESS_MESSAGE: &str = "PDF uploaded successfully";

/// Upload response, shaped by the configured URL policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    /// `{"message": ..., "url": ...}`
    Signed { message: String, url: String },

    /// `{"publicUrl": ..., "filePath": ...}`
    #[serde(rename_all = "camelCase")]
    Public { public_url: String, file_path: String },
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        match receipt.retrieval_url {
            RetrievalUrl::Signed { url, .. } => Self::Signed {
                message: UPLOAD_SUCCESS_MESSAGE.to_string(),
                url,
            },
            RetrievalUrl::Public { url } => Self::Public {
                public_url: url,
                file_path: receipt.stored_key.to_string(),
            },
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }
}

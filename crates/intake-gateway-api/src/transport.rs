//! # Upload Transports
//!
//! Two ways of carrying an upload over HTTP, both normalized into an
//! [`UploadRequest`]:
//!
//! - raw binary body with the session id in the `x-session-id` header
//! - `multipart/form-data` with a `sessionId` text field and a `file` part

use crate::errors::UploadHandlerError;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap, StatusCode};
use bytes::Bytes;
use intake_gateway_core::{media_type_matches, UploadRequest, UploadedFile};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;

/// Header carrying the session id on raw-binary uploads
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Multipart text field carrying the session id
pub const SESSION_ID_FIELD: &str = "sessionId";

/// Multipart part carrying the document
pub const FILE_FIELD: &str = "file";

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// How an upload request is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    RawBinary,
    Multipart,
}

impl Transport {
    /// `multipart/form-data` selects the multipart transport, anything else the raw one
    pub fn detect(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        if media_type_matches(content_type, MULTIPART_FORM_DATA) {
            Self::Multipart
        } else {
            Self::RawBinary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawBinary => "raw",
            Self::Multipart => "multipart",
        }
    }
}

/// Read a raw-binary upload
///
/// The request body is the document; its `Content-Type` header is the
/// declared type.
pub async fn read_raw_upload(request: Request) -> Result<UploadRequest, UploadHandlerError> {
    let session_id = header_string(request.headers(), SESSION_ID_HEADER);
    let content_type = header_string(request.headers(), header::CONTENT_TYPE.as_str());

    let bytes = Bytes::from_request(request, &()).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadHandlerError::PayloadTooLarge
        } else {
            UploadHandlerError::InternalError {
                message: rejection.body_text(),
            }
        }
    })?;

    debug!(size = bytes.len(), "Read raw upload body");
    Ok(UploadRequest::new(
        session_id,
        Some(UploadedFile::new(bytes, content_type, None)),
    ))
}

/// Read a multipart upload
///
/// Only the first `file` part is used. When `staging_dir` is set, the part is
/// streamed to a temporary file there and read back before it is handed on.
pub async fn read_multipart_upload(
    request: Request,
    staging_dir: Option<&Path>,
) -> Result<UploadRequest, UploadHandlerError> {
    let mut multipart = Multipart::from_request(request, &()).await.map_err(|rejection| {
        UploadHandlerError::MalformedMultipart {
            message: rejection.body_text(),
        }
    })?;

    let mut session_id = None;
    let mut file = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(SESSION_ID_FIELD) => {
                session_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some(FILE_FIELD) if file.is_none() => {
                let content_type = field.content_type().map(str::to_string);
                let filename = field.file_name().map(str::to_string);
                let bytes = match staging_dir {
                    Some(dir) => stage_field(&mut field, dir).await?,
                    None => field.bytes().await.map_err(multipart_error)?,
                };
                file = Some(UploadedFile::new(bytes, content_type, filename));
            }
            other => {
                debug!(field = ?other, "Ignoring multipart field");
            }
        }
    }

    Ok(UploadRequest::new(session_id, file))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn multipart_error(error: MultipartError) -> UploadHandlerError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadHandlerError::PayloadTooLarge
    } else {
        UploadHandlerError::MalformedMultipart {
            message: error.body_text(),
        }
    }
}

fn staging_error(error: std::io::Error) -> UploadHandlerError {
    UploadHandlerError::InternalError {
        message: format!("Upload staging failed: {}", error),
    }
}

// ============================================================================
// Staging
// ============================================================================

/// Stream a file part to disk, read it back and remove the temporary file
///
/// Removal is best effort: a failure is logged and the upload continues.
async fn stage_field(
    field: &mut Field<'_>,
    staging_dir: &Path,
) -> Result<Bytes, UploadHandlerError> {
    let path = staging_dir.join(format!("upload-{}.part", uuid::Uuid::new_v4()));
    let result = write_and_read_back(field, staging_dir, &path).await;

    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "Removed staged upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove staged upload"
        ),
    }

    result
}

async fn write_and_read_back(
    field: &mut Field<'_>,
    staging_dir: &Path,
    path: &Path,
) -> Result<Bytes, UploadHandlerError> {
    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(staging_error)?;

    let mut staged = tokio::fs::File::create(path).await.map_err(staging_error)?;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        staged.write_all(&chunk).await.map_err(staging_error)?;
    }
    staged.flush().await.map_err(staging_error)?;
    drop(staged);

    let data = tokio::fs::read(path).await.map_err(staging_error)?;
    Ok(Bytes::from(data))
}

//! Tests for error-to-response mapping.

use super::*;
use axum::body::to_bytes;
use intake_gateway_core::upload::{derive_storage_key, KeyScheme};
use intake_gateway_core::SessionId;

fn sample_key() -> StorageKey {
    derive_storage_key(
        KeyScheme::SessionDocument,
        &SessionId::new("abc123".to_string()).unwrap(),
        "document.pdf",
    )
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn test_missing_session_id_message_depends_on_transport() {
    let raw = UploadHandlerError::from_upload(
        UploadError::Validation(ValidationError::Required {
            field: "session_id".to_string(),
        }),
        Transport::RawBinary,
    );
    let multipart = UploadHandlerError::from_upload(
        UploadError::Validation(ValidationError::Required {
            field: "session_id".to_string(),
        }),
        Transport::Multipart,
    );

    assert_eq!(raw.status(), StatusCode::BAD_REQUEST);
    assert_eq!(raw.public_message(), "Missing x-session-id header");
    assert_eq!(multipart.public_message(), "Missing sessionId field");
}

#[test]
fn test_validation_errors_map_to_client_statuses() {
    let cases = [
        (
            ValidationError::EmptyPayload {
                field: "file".to_string(),
            },
            StatusCode::BAD_REQUEST,
            "Invalid PDF file",
        ),
        (
            ValidationError::UnsupportedMediaType {
                expected: "application/pdf".to_string(),
                actual: "image/png".to_string(),
            },
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Only application/pdf uploads are accepted",
        ),
        (
            ValidationError::InvalidFormat {
                field: "session_id".to_string(),
                message: "path separators are not allowed".to_string(),
            },
            StatusCode::BAD_REQUEST,
            "Invalid session id",
        ),
        (
            ValidationError::TooLong {
                field: "session_id".to_string(),
                max_length: 128,
            },
            StatusCode::BAD_REQUEST,
            "Invalid session id",
        ),
        (
            ValidationError::InvalidFormat {
                field: "filename".to_string(),
                message: "reserved name".to_string(),
            },
            StatusCode::BAD_REQUEST,
            "Invalid upload request",
        ),
        (
            ValidationError::Required {
                field: "file".to_string(),
            },
            StatusCode::BAD_REQUEST,
            "Invalid upload request",
        ),
    ];

    for (validation, status, message) in cases {
        let error =
            UploadHandlerError::from_upload(UploadError::Validation(validation), Transport::RawBinary);

        assert_eq!(error.status(), status);
        assert_eq!(error.public_message(), message);
    }
}

#[test]
fn test_storage_and_url_failures_are_distinct() {
    let write = UploadHandlerError::from_upload(
        UploadError::StorageWrite {
            key: sample_key(),
            source: StorageError::Conflict {
                key: "business-pdfs/abc123.pdf".to_string(),
            },
        },
        Transport::RawBinary,
    );
    let url = UploadHandlerError::from_upload(
        UploadError::UrlGeneration {
            key: sample_key(),
            source: StorageError::ConnectionFailed {
                message: "reset".to_string(),
            },
        },
        Transport::RawBinary,
    );

    assert_eq!(write.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(write.public_message(), "Failed to upload PDF");
    assert_eq!(url.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(url.public_message(), "Failed to generate signed URL");
}

#[tokio::test]
async fn test_upload_error_body_hides_cause() {
    let error = UploadHandlerError::StorageWrite {
        key: sample_key(),
        source: StorageError::Unauthorized {
            message: "invalid JWT: secret-detail".to_string(),
        },
    };

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body, serde_json::json!({ "error": "Failed to upload PDF" }));
}

#[tokio::test]
async fn test_forward_errors_map_to_fixed_messages() {
    let cases = [
        (
            ForwardHandlerError::MissingPayload,
            StatusCode::BAD_REQUEST,
            "Missing JSON payload",
        ),
        (
            ForwardHandlerError::InvalidPayload {
                message: "expected value".to_string(),
            },
            StatusCode::BAD_REQUEST,
            "Invalid JSON payload",
        ),
        (
            ForwardHandlerError::Upstream(ForwardError::Transport {
                message: "connection refused".to_string(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Proxy request failed",
        ),
        (
            ForwardHandlerError::InvalidUpstreamStatus { status: 1000 },
            StatusCode::INTERNAL_SERVER_ERROR,
            "Proxy request failed",
        ),
    ];

    for (error, status, message) in cases {
        let response = error.into_response();

        assert_eq!(response.status(), status);
        assert_eq!(body_json(response).await, serde_json::json!({ "error": message }));
    }
}

//! Tests for core domain types

use super::*;

// ============================================================================
// SessionId Tests
// ============================================================================

#[test]
fn test_session_id_accepts_opaque_token() {
    let session_id = SessionId::new("abc123".to_string()).expect("valid session id");

    assert_eq!(session_id.as_str(), "abc123");
    assert_eq!(session_id.to_string(), "abc123");
}

#[test]
fn test_session_id_accepts_uuid_and_punctuation() {
    assert!(SessionId::new("3f2b8c1e-9d4a-4e7b-a1c2-0f9e8d7c6b5a".to_string()).is_ok());
    assert!(SessionId::new("survey_2024.q3".to_string()).is_ok());
}

#[test]
fn test_session_id_rejects_empty() {
    let result = SessionId::new(String::new());

    assert_eq!(
        result,
        Err(ValidationError::Required {
            field: "session_id".to_string()
        })
    );
}

#[test]
fn test_session_id_rejects_path_separators() {
    for value in ["../other", "a/b", "a\\b", "/abs"] {
        let result = SessionId::new(value.to_string());
        assert!(
            matches!(result, Err(ValidationError::InvalidFormat { .. })),
            "expected {value:?} to be rejected"
        );
    }
}

#[test]
fn test_session_id_rejects_dot_segments() {
    assert!(matches!(
        SessionId::new(".".to_string()),
        Err(ValidationError::InvalidFormat { .. })
    ));
    assert!(matches!(
        SessionId::new("..".to_string()),
        Err(ValidationError::InvalidFormat { .. })
    ));
}

#[test]
fn test_session_id_rejects_whitespace_and_control_characters() {
    for value in ["has space", "tab\there", "new\nline", "café"] {
        assert!(
            matches!(
                SessionId::new(value.to_string()),
                Err(ValidationError::InvalidCharacters { .. })
            ),
            "expected {value:?} to be rejected"
        );
    }
}

#[test]
fn test_session_id_rejects_overlong_value() {
    let result = SessionId::new("a".repeat(MAX_SESSION_ID_LENGTH + 1));

    assert!(matches!(
        result,
        Err(ValidationError::TooLong { max_length, .. }) if max_length == MAX_SESSION_ID_LENGTH
    ));
    assert!(SessionId::new("a".repeat(MAX_SESSION_ID_LENGTH)).is_ok());
}

// ============================================================================
// Media Type Tests
// ============================================================================

#[test]
fn test_media_type_matches_exact_value() {
    assert!(media_type_matches(Some("application/pdf"), PDF_MEDIA_TYPE));
}

#[test]
fn test_media_type_ignores_parameters_and_case() {
    assert!(media_type_matches(
        Some("Application/PDF; charset=binary"),
        PDF_MEDIA_TYPE
    ));
    assert!(media_type_matches(Some(" application/pdf ;x=y"), PDF_MEDIA_TYPE));
}

#[test]
fn test_media_type_rejects_other_types_and_absence() {
    assert!(!media_type_matches(Some("application/octet-stream"), PDF_MEDIA_TYPE));
    assert!(!media_type_matches(Some("application/pdfx"), PDF_MEDIA_TYPE));
    assert!(!media_type_matches(Some(""), PDF_MEDIA_TYPE));
    assert!(!media_type_matches(None, PDF_MEDIA_TYPE));
}

#[test]
fn test_validation_error_field_names() {
    let error = ValidationError::EmptyPayload {
        field: "file".to_string(),
    };
    assert_eq!(error.field(), "file");

    let error = ValidationError::UnsupportedMediaType {
        expected: PDF_MEDIA_TYPE.to_string(),
        actual: "text/plain".to_string(),
    };
    assert_eq!(error.field(), "content_type");
    assert!(error.to_string().contains("text/plain"));
}

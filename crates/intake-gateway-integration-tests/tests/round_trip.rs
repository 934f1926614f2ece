//! Upload round trips through the router into filesystem storage.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{build_router, json_body, multipart_upload, raw_upload, MockForwarder};
use intake_gateway_api::{create_router, AppState, ServiceConfig, UrlMode};
use intake_gateway_core::adapters::FilesystemStorage;
use intake_gateway_core::KeyScheme;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const PUBLIC_BASE_URL: &str = "http://localhost:3000/files";

async fn filesystem_storage(dir: &TempDir) -> Arc<FilesystemStorage> {
    Arc::new(
        FilesystemStorage::new(dir.path().to_path_buf(), PUBLIC_BASE_URL)
            .await
            .unwrap(),
    )
}

/// Router that stores into `storage` and serves its files back
fn serving_router(config: ServiceConfig, storage: Arc<FilesystemStorage>) -> Router {
    create_router(
        AppState::new(config, storage.clone(), Arc::new(MockForwarder::new()))
            .with_file_server(storage),
    )
}

async fn get_url(router: Router, url: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let path = url
        .strip_prefix("http://localhost:3000")
        .expect("URL points at this server");
    let response = router
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, bytes.to_vec())
}

#[tokio::test]
async fn test_uploaded_bytes_read_back_unchanged() {
    let dir = TempDir::new().unwrap();
    let router = serving_router(ServiceConfig::default(), filesystem_storage(&dir).await);
    let payload: Vec<u8> = b"%PDF-1.7\n"
        .iter()
        .copied()
        .chain((0..=255u8).cycle().take(128 * 1024))
        .collect();

    let response = router
        .clone()
        .oneshot(raw_upload(
            "/api/upload-pdf",
            Some("round-trip"),
            Some("application/pdf"),
            payload.clone(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("http://localhost:3000/files/business-pdfs/round-trip.pdf?expires="));

    let (status, content_type, retrieved) = get_url(router, &url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert_eq!(retrieved, payload);
}

#[tokio::test]
async fn test_public_url_of_session_folder_upload_resolves() {
    let dir = TempDir::new().unwrap();
    let mut config = ServiceConfig::default();
    config.upload.key_scheme = KeyScheme::SessionFolder;
    config.upload.url_mode = UrlMode::Public;
    let router = serving_router(config, filesystem_storage(&dir).await);

    let response = router
        .clone()
        .oneshot(multipart_upload(
            "/api/upload-pdf",
            Some("abc123"),
            "q3 report.pdf",
            "application/pdf",
            b"%PDF quarterly",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["filePath"], "abc123/q3 report.pdf");
    let url = body["publicUrl"].as_str().unwrap().to_string();
    assert_eq!(url, "http://localhost:3000/files/abc123/q3%20report.pdf");

    let (status, _, retrieved) = get_url(router, &url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retrieved, b"%PDF quarterly");
}

#[tokio::test]
async fn test_file_route_does_not_leak_outside_storage() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("outside.pdf"), b"secret").unwrap();
    let storage_dir = dir.path().join("objects");
    let storage = Arc::new(
        FilesystemStorage::new(storage_dir, PUBLIC_BASE_URL)
            .await
            .unwrap(),
    );
    let router = serving_router(ServiceConfig::default(), storage);

    for url in [
        "http://localhost:3000/files/missing/report.pdf",
        "http://localhost:3000/files/..%2Foutside.pdf",
        "http://localhost:3000/files/business-pdfs",
    ] {
        let (status, _, body) = get_url(router.clone(), url).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{url}");
        assert_ne!(body, b"secret");
    }
}

#[tokio::test]
async fn test_files_are_not_served_without_file_server() {
    let dir = TempDir::new().unwrap();
    let storage = filesystem_storage(&dir).await;
    let router = build_router(
        ServiceConfig::default(),
        storage,
        Arc::new(MockForwarder::new()),
    );

    let (status, _, _) = get_url(router, "http://localhost:3000/files/business-pdfs/x.pdf").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_second_upload_conflicts_and_keeps_first_object() {
    let dir = TempDir::new().unwrap();
    let storage = filesystem_storage(&dir).await;
    let mut config = ServiceConfig::default();
    config.upload.url_mode = UrlMode::Public;
    let router = build_router(config, storage, Arc::new(MockForwarder::new()));

    let first = router
        .clone()
        .oneshot(raw_upload(
            "/api/upload-pdf",
            Some("abc123"),
            Some("application/pdf"),
            &b"%PDF first"[..],
        ))
        .await
        .unwrap();
    let second = router
        .oneshot(raw_upload(
            "/api/upload-pdf",
            Some("abc123"),
            Some("application/pdf"),
            &b"%PDF second"[..],
        ))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        json_body(first).await["filePath"],
        "business-pdfs/abc123.pdf"
    );
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let on_disk = std::fs::read(dir.path().join("business-pdfs").join("abc123.pdf")).unwrap();
    assert_eq!(on_disk, b"%PDF first");
}

//! Common test utilities for intake-gateway-api integration tests
//!
//! This module provides:
//! - Mock implementations of the storage and webhook forwarder capabilities
//! - Router construction with a given configuration
//! - Request builders for raw and multipart uploads

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use bytes::Bytes;
use intake_gateway_api::{create_router, AppState, ServiceConfig};
use intake_gateway_core::{
    ForwardError, ForwardResponse, PutOptions, StorageCapability, StorageError, StorageKey,
    StoredObject, WebhookForwarder,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Storage
// ============================================================================

/// In-memory storage recording every write
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, (Bytes, PutOptions)>>>,
    put_calls: Arc<Mutex<usize>>,
    put_error: Arc<Mutex<Option<StorageError>>>,
    sign_error: Arc<Mutex<Option<StorageError>>>,
    signed_ttls: Arc<Mutex<Vec<Duration>>>,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with `error`
    pub fn fail_writes(&self, error: StorageError) {
        *self.put_error.lock().unwrap() = Some(error);
    }

    /// Make every signed URL request fail with `error`
    pub fn fail_signing(&self, error: StorageError) {
        *self.sign_error.lock().unwrap() = Some(error);
    }

    pub fn put_calls(&self) -> usize {
        *self.put_calls.lock().unwrap()
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn options(&self, key: &str) -> Option<PutOptions> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, options)| options.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn signed_ttls(&self) -> Vec<Duration> {
        self.signed_ttls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageCapability for MockStorage {
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<StoredObject, StorageError> {
        *self.put_calls.lock().unwrap() += 1;

        if let Some(error) = self.put_error.lock().unwrap().clone() {
            return Err(error);
        }

        let mut objects = self.objects.lock().unwrap();
        if !options.upsert && objects.contains_key(key.as_str()) {
            return Err(StorageError::Conflict {
                key: key.to_string(),
            });
        }

        let size_bytes = body.len() as u64;
        objects.insert(key.to_string(), (body, options.clone()));
        Ok(StoredObject {
            key: key.clone(),
            size_bytes,
        })
    }

    async fn create_signed_url(
        &self,
        key: &StorageKey,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.signed_ttls.lock().unwrap().push(expires_in);

        if let Some(error) = self.sign_error.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(format!(
            "https://storage.test/object/sign/bucket/{}?token=signed",
            key
        ))
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!("https://storage.test/object/public/bucket/{}", key)
    }
}

// ============================================================================
// Mock Forwarder
// ============================================================================

/// Forwarder returning a preset response and recording payloads
#[derive(Clone)]
#[allow(dead_code)]
pub struct MockForwarder {
    payloads: Arc<Mutex<Vec<serde_json::Value>>>,
    result: Arc<Mutex<Result<ForwardResponse, ForwardError>>>,
}

#[allow(dead_code)]
impl MockForwarder {
    pub fn new() -> Self {
        Self {
            payloads: Arc::new(Mutex::new(Vec::new())),
            result: Arc::new(Mutex::new(Ok(ForwardResponse {
                status: 200,
                body: serde_json::json!({ "ok": true }),
            }))),
        }
    }

    pub fn respond_with(&self, status: u16, body: serde_json::Value) {
        *self.result.lock().unwrap() = Ok(ForwardResponse { status, body });
    }

    pub fn fail_with(&self, error: ForwardError) {
        *self.result.lock().unwrap() = Err(error);
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookForwarder for MockForwarder {
    async fn forward(&self, payload: &serde_json::Value) -> Result<ForwardResponse, ForwardError> {
        self.payloads.lock().unwrap().push(payload.clone());
        self.result.lock().unwrap().clone()
    }
}

// ============================================================================
// Test Fixtures
// ============================================================================

#[allow(dead_code)]
pub fn build_router(
    config: ServiceConfig,
    storage: Arc<dyn StorageCapability>,
    forwarder: Arc<dyn WebhookForwarder>,
) -> Router {
    create_router(AppState::new(config, storage, forwarder))
}

/// Router with default configuration and fresh mocks
#[allow(dead_code)]
pub fn default_app() -> (Router, MockStorage, MockForwarder) {
    let storage = MockStorage::new();
    let forwarder = MockForwarder::new();
    let router = build_router(
        ServiceConfig::default(),
        Arc::new(storage.clone()),
        Arc::new(forwarder.clone()),
    );
    (router, storage, forwarder)
}

/// Raw-binary upload request
#[allow(dead_code)]
pub fn raw_upload(
    path: &str,
    session_id: Option<&str>,
    content_type: Option<&str>,
    body: impl Into<Body>,
) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(path);
    if let Some(session_id) = session_id {
        builder = builder.header("x-session-id", session_id);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body.into()).unwrap()
}

pub const MULTIPART_BOUNDARY: &str = "------------------------intake-gateway";

/// Multipart upload request with an optional session field and one file part
#[allow(dead_code)]
pub fn multipart_upload(
    path: &str,
    session_id: Option<&str>,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(session_id) = session_id {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"sessionId\"\r\n\r\n{v}\r\n",
                b = MULTIPART_BOUNDARY,
                v = session_id
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {c}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            f = filename,
            c = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn text_body(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

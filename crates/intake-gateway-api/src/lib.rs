//! # Intake Gateway HTTP Service
//!
//! HTTP server exposing the intake gateway to the browser front-end.
//!
//! This service provides:
//! - `POST /api/upload-pdf` (alias `/upload-pdf`): validated PDF upload into storage
//! - `POST /api/proxy-clay`: pass-through forwarding of JSON payloads to a webhook
//! - An origin allow-list guard and pre-flight handling on both endpoints
//! - Health check and banner endpoints
//! - With filesystem storage, read-only serving of the stored files

pub mod config;
pub mod errors;
pub mod responses;
pub mod transport;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

pub use config::{
    CorsConfig, ForwarderConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig,
    StorageProvider, UploadConfig, UrlMode,
};
pub use errors::{ConfigError, ForwardHandlerError, ServiceError, UploadHandlerError};
pub use responses::{HealthResponse, UploadResponse};
pub use transport::Transport;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use bytes::Bytes;
use intake_gateway_core::adapters::FilesystemStorage;
use intake_gateway_core::{
    OriginPolicy, StorageCapability, StorageError, UploadGateway, WebhookForwarder,
    PDF_MEDIA_TYPE,
};
use std::{future::IntoFuture, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Webhook proxy endpoint
pub const FORWARD_PATH: &str = "/api/proxy-clay";

/// Upload endpoint
pub const UPLOAD_PATH: &str = "/api/upload-pdf";

/// Legacy upload path served by the original Express server
pub const UPLOAD_ALIAS_PATH: &str = "/upload-pdf";

/// Body of `GET /`
pub const ROOT_BANNER: &str = "Hello from Proxy Server";

const FORWARD_ALLOW: &str = "POST";
const UPLOAD_ALLOW: &str = "POST, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Content-Type, x-session-id";
const CORS_MAX_AGE_SECONDS: &str = "86400";

/// Correlation id of the current request, set by the logging middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    fn of(request: &Request) -> Option<&str> {
        request
            .extensions()
            .get::<CorrelationId>()
            .map(|id| id.0.as_str())
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Upload validation and storage
    pub upload_gateway: Arc<UploadGateway>,

    /// Webhook destination for proxied payloads
    pub forwarder: Arc<dyn WebhookForwarder>,

    /// Browser origin allow-list
    pub origin_policy: Arc<OriginPolicy>,

    /// Local storage whose objects are served back over HTTP
    pub file_server: Option<FileServer>,
}

/// Read-only view of [`FilesystemStorage`] mounted on the router
#[derive(Clone)]
pub struct FileServer {
    storage: Arc<FilesystemStorage>,
    mount_path: String,
}

impl FileServer {
    /// Route prefix, e.g. `/files`
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }
}

impl AppState {
    /// Create application state from configuration and capabilities
    pub fn new(
        config: ServiceConfig,
        storage: Arc<dyn StorageCapability>,
        forwarder: Arc<dyn WebhookForwarder>,
    ) -> Self {
        let upload_gateway = UploadGateway::new(storage, config.upload.policy());
        let origin_policy = config.cors.policy();

        Self {
            config: Arc::new(config),
            upload_gateway: Arc::new(upload_gateway),
            forwarder,
            origin_policy: Arc::new(origin_policy),
            file_server: None,
        }
    }

    /// Serve the objects of `storage` under the path of
    /// `storage.filesystem.public_base_url`, so the URLs returned by uploads
    /// resolve against this server
    pub fn with_file_server(mut self, storage: Arc<FilesystemStorage>) -> Self {
        match self.config.storage.filesystem.mount_path() {
            Some(mount_path) => {
                self.file_server = Some(FileServer {
                    storage,
                    mount_path,
                });
            }
            None => warn!(
                public_base_url = %self.config.storage.filesystem.public_base_url,
                "Public base URL has no servable path; stored files will not be served"
            ),
        }
        self
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let gateway_routes = Router::new()
        .route(FORWARD_PATH, forward_methods())
        .route(UPLOAD_PATH, upload_methods())
        .route(UPLOAD_ALIAS_PATH, upload_methods())
        .route_layer(middleware::from_fn_with_state(state.clone(), origin_guard));

    let mut health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/", get(handle_root));

    if let Some(files) = &state.file_server {
        health_routes = health_routes.route(
            &format!("{}/{{*key_path}}", files.mount_path),
            get(handle_file_download),
        );
    }

    Router::new()
        .merge(gateway_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

fn forward_methods() -> MethodRouter<AppState> {
    post(handle_forward)
        .options(forward_preflight)
        .fallback(forward_method_not_allowed)
}

fn upload_methods() -> MethodRouter<AppState> {
    post(handle_upload)
        .options(upload_preflight)
        .fallback(upload_method_not_allowed)
}

/// Start HTTP server
///
/// Runs until SIGINT or SIGTERM. In-flight requests get
/// `server.shutdown_timeout_seconds` to finish after the signal.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(address.as_str())
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Draining in-flight requests"
            );
            let _ = signalled_tx.send(());
        })
        .into_future();

    let drain_deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; dropping remaining connections"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Gateway Handlers
// ============================================================================

/// Handle PDF upload
///
/// The transport is picked from the `Content-Type` header. Validation and
/// storage happen in [`UploadGateway::upload`].
#[instrument(skip(state, request), fields(transport, correlation_id))]
pub async fn handle_upload(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UploadResponse>, UploadHandlerError> {
    let span = tracing::Span::current();
    if let Some(correlation_id) = CorrelationId::of(&request) {
        span.record("correlation_id", correlation_id);
    }
    let transport = Transport::detect(request.headers());
    span.record("transport", transport.as_str());

    let upload_request = match transport {
        Transport::RawBinary => transport::read_raw_upload(request).await?,
        Transport::Multipart => {
            transport::read_multipart_upload(request, state.config.upload.staging_dir.as_deref())
                .await?
        }
    };

    let receipt = state
        .upload_gateway
        .upload(upload_request)
        .await
        .map_err(|e| UploadHandlerError::from_upload(e, transport))?;

    info!(
        key = %receipt.stored_key,
        size_bytes = receipt.size_bytes,
        "PDF upload completed"
    );

    Ok(Json(UploadResponse::from(receipt)))
}

/// Forward a JSON payload to the webhook and relay its answer
#[instrument(skip(state, request), fields(correlation_id))]
pub async fn handle_forward(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ForwardHandlerError> {
    if let Some(correlation_id) = CorrelationId::of(&request) {
        tracing::Span::current().record("correlation_id", correlation_id);
    }

    let body = Bytes::from_request(request, &()).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ForwardHandlerError::PayloadTooLarge
        } else {
            ForwardHandlerError::InvalidPayload {
                message: rejection.body_text(),
            }
        }
    })?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ForwardHandlerError::MissingPayload);
    }

    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| ForwardHandlerError::InvalidPayload {
            message: e.to_string(),
        })?;

    let forwarded = state.forwarder.forward(&payload).await?;
    let status = StatusCode::from_u16(forwarded.status).map_err(|_| {
        ForwardHandlerError::InvalidUpstreamStatus {
            status: forwarded.status,
        }
    })?;

    info!(status = forwarded.status, "Webhook payload forwarded");
    Ok((status, Json(forwarded.body)).into_response())
}

async fn forward_preflight() -> Response {
    preflight_response(FORWARD_ALLOW)
}

async fn upload_preflight() -> Response {
    preflight_response(UPLOAD_ALLOW)
}

async fn forward_method_not_allowed(method: Method) -> Response {
    method_not_allowed(&method, FORWARD_ALLOW)
}

async fn upload_method_not_allowed(method: Method) -> Response {
    method_not_allowed(&method, UPLOAD_ALLOW)
}

fn preflight_response(allow: &'static str) -> Response {
    (StatusCode::NO_CONTENT, [(header::ALLOW, allow)]).into_response()
}

fn method_not_allowed(method: &Method, allow: &'static str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, allow)],
        format!("Method {} Not Allowed", method),
    )
        .into_response()
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn handle_root() -> &'static str {
    ROOT_BANNER
}

/// Serve a stored file
///
/// The `expires` query of filesystem signed URLs is not checked.
async fn handle_file_download(
    State(state): State<AppState>,
    Path(key_path): Path<String>,
) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "File not found" })),
        )
            .into_response()
    };

    let Some(files) = state.file_server.as_ref() else {
        return not_found();
    };

    match files.storage.read_key_path(&key_path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, PDF_MEDIA_TYPE)], bytes).into_response(),
        Err(StorageError::NotFound { .. } | StorageError::InvalidKey { .. }) => not_found(),
        Err(e) => {
            error!(key = %key_path, error = %e, "Failed to read stored file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to read file" })),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Origin allow-list guard for the gateway routes
///
/// A disallowed origin is answered with `403` before the handler runs, so the
/// body is never read. Pre-flight requests always reach their handler; CORS
/// headers are only added for allowed origins.
async fn origin_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let decision = state.origin_policy.check(
        request
            .headers()
            .get(header::ORIGIN)
            .map(|value| value.to_str().unwrap_or_default()),
    );
    let preflight = request.method() == Method::OPTIONS;

    if !decision.is_allowed() && !preflight {
        warn!(
            origin = ?decision,
            method = %request.method(),
            uri = %request.uri(),
            "Rejected request from disallowed origin"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "Origin not allowed" })),
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    if let Some(origin) = decision.allow_origin() {
        apply_cors_headers(response.headers_mut(), origin, preflight);
    }

    response
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &str, preflight: bool) {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };

    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.append(header::VARY, HeaderValue::from_static("Origin"));

    if preflight {
        if let Some(allow) = headers.get(header::ALLOW).cloned() {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, allow);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(CORS_MAX_AGE_SECONDS),
        );
    }
}

/// Request logging middleware with correlation ID tracking
///
/// Extracts or generates the `x-correlation-id` header, records it on the
/// span, echoes it on the response and logs completion by status class.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

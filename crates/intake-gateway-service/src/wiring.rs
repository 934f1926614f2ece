//! Configuration loading, logging setup and adapter construction.

use intake_gateway_api::{
    AppState, ConfigError, LoggingConfig, ServiceConfig, ServiceError, StorageProvider,
};
use intake_gateway_core::adapters::{
    FilesystemStorage, HttpWebhookForwarder, SupabaseStorage, SupabaseStorageConfig,
};
use intake_gateway_core::{StorageCapability, WebhookForwarder};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_VAR: &str = "IG_CONFIG_FILE";

const DEFAULT_LOG_FILTER: &str =
    "intake_gateway_service=info,intake_gateway_api=info,intake_gateway_core=info,tower_http=debug";

/// Load, override and validate the service configuration
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/intake-gateway/service.yaml`
///  2. `./config/service.yaml`
///  3. the file named by `IG_CONFIG_FILE`
///  4. environment variables prefixed `IG__`, e.g. `IG__SERVER__PORT=8080`
///  5. `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY` and `SUPABASE_BUCKET`
pub fn load_config<F>(lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/intake-gateway/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(explicit_path) = lookup(CONFIG_FILE_VAR).filter(|path| !path.is_empty()) {
        builder = builder.add_source(
            config::File::with_name(&explicit_path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("IG")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins"),
        )
        .build()
        .map_err(|e| ConfigError::Loading {
            message: e.to_string(),
        })?;

    let mut service_config: ServiceConfig =
        settings.try_deserialize().map_err(|e| ConfigError::Loading {
            message: e.to_string(),
        })?;

    service_config.apply_env_overrides(lookup);
    service_config.validate()?;

    Ok(service_config)
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if logging.level.contains('=') {
            logging.level.as_str().into()
        } else {
            DEFAULT_LOG_FILTER.replace("=info", &format!("={}", logging.level)).into()
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

/// Storage adapter selected by `storage.provider`
pub enum StorageBackend {
    Supabase(Arc<SupabaseStorage>),
    Filesystem(Arc<FilesystemStorage>),
}

impl StorageBackend {
    pub fn capability(&self) -> Arc<dyn StorageCapability> {
        match self {
            Self::Supabase(storage) => storage.clone(),
            Self::Filesystem(storage) => storage.clone(),
        }
    }
}

/// Build the configured storage backend
pub async fn build_storage(config: &ServiceConfig) -> Result<StorageBackend, ServiceError> {
    match config.storage.provider {
        StorageProvider::Supabase => {
            let settings = &config.storage.supabase;
            let project_url = settings.url.clone().ok_or_else(|| ConfigError::Missing {
                key: "storage.supabase.url".to_string(),
            })?;
            let service_role_key =
                settings
                    .service_role_key
                    .clone()
                    .ok_or_else(|| ConfigError::Missing {
                        key: "storage.supabase.service_role_key".to_string(),
                    })?;

            let storage = SupabaseStorage::new(SupabaseStorageConfig {
                project_url,
                service_role_key,
                bucket: settings.bucket.clone(),
            })
            .map_err(|e| initialization_error("supabase storage", e))?;

            info!(bucket = %storage.bucket(), "Using Supabase storage");
            Ok(StorageBackend::Supabase(Arc::new(storage)))
        }
        StorageProvider::Filesystem => {
            let settings = &config.storage.filesystem;
            let storage =
                FilesystemStorage::new(settings.base_path.clone(), &settings.public_base_url)
                    .await
                    .map_err(|e| initialization_error("filesystem storage", e))?;

            info!(path = %storage.base_path().display(), "Using filesystem storage");
            Ok(StorageBackend::Filesystem(Arc::new(storage)))
        }
    }
}

/// Assemble the router state; filesystem storage is also served back over HTTP
pub fn app_state(
    config: ServiceConfig,
    storage: StorageBackend,
    forwarder: Arc<dyn WebhookForwarder>,
) -> AppState {
    let state = AppState::new(config, storage.capability(), forwarder);
    match storage {
        StorageBackend::Supabase(_) => state,
        StorageBackend::Filesystem(files) => state.with_file_server(files),
    }
}

/// Build the webhook forwarder for the configured destination
pub fn build_forwarder(config: &ServiceConfig) -> Result<Arc<dyn WebhookForwarder>, ServiceError> {
    let forwarder = HttpWebhookForwarder::new(&config.forwarder.destination_url)
        .map_err(|e| initialization_error("webhook forwarder", e))?;

    info!(
        destination = %forwarder.destination().host_str().unwrap_or_default(),
        "Using webhook forwarder"
    );
    Ok(Arc::new(forwarder))
}

/// Process exit code for a startup or runtime failure
pub fn exit_code(error: &ServiceError) -> i32 {
    match error {
        ServiceError::BindFailed { .. } => 1,
        ServiceError::ServerFailed { .. } => 2,
        ServiceError::Configuration(_) => 3,
        ServiceError::Initialization { .. } => 4,
    }
}

fn initialization_error(component: &str, error: impl std::fmt::Display) -> ServiceError {
    ServiceError::Initialization {
        component: component.to_string(),
        message: error.to_string(),
    }
}

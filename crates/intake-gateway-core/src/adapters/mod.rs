//! # Infrastructure Adapters
//!
//! Implementations of the storage and webhook forwarder capabilities.

pub mod filesystem_storage;
pub mod http_forwarder;
pub mod supabase_storage;

pub use filesystem_storage::FilesystemStorage;
pub use http_forwarder::{HttpWebhookForwarder, DEFAULT_WEBHOOK_URL};
pub use supabase_storage::{ServiceRoleKey, SupabaseStorage, SupabaseStorageConfig};

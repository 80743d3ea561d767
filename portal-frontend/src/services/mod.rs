pub mod content_client;
pub mod metrics;
pub mod permission_cache;

pub use content_client::{ContentStoreClient, PermissionSource};
pub use permission_cache::PermissionCache;

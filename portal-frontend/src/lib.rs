pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod services;
pub mod startup;

use config::Settings;
use models::SuperAdmins;
use permissions::SlugAliases;
use services::{ContentStoreClient, PermissionCache, PermissionSource};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<PermissionCache>,
    pub aliases: Arc<SlugAliases>,
    pub super_admins: SuperAdmins,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        source: Arc<dyn PermissionSource>,
        settings: &Settings,
    ) -> Self {
        let permissions = &settings.permissions;
        Self {
            cache: Arc::new(PermissionCache::new(source, permissions.cache_ttl())),
            aliases: Arc::new(permissions.aliases()),
            super_admins: SuperAdmins::new(&permissions.super_admins),
            static_dir: PathBuf::from(&settings.server.static_dir),
        }
    }

    /// State backed by the configured content store.
    pub fn from_settings(settings: &Settings) -> Self {
        let client = ContentStoreClient::new(
            settings.content_store.clone(),
            settings.permissions.retry(),
        );
        Self::new(Arc::new(client), settings)
    }
}

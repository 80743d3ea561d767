use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{configuration_directory, load_layered};
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::time::Duration;

use crate::permissions::SlugAliases;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub content_store: ContentStoreSettings,
    #[serde(default)]
    pub permissions: PermissionSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory holding the built portal shell (index.html and assets).
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_static_dir() -> String {
    "portal-frontend/static".to_string()
}

#[derive(Deserialize, Clone)]
pub struct ContentStoreSettings {
    /// Base URL of the CMS / permissions REST API.
    pub url: String,
    /// Service token sent as a bearer token; empty disables the header.
    #[serde(default = "default_token")]
    pub token: Secret<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_modules_path")]
    pub modules_path: String,
    #[serde(default = "default_pages_path")]
    pub pages_path: String,
    /// Path of the per-user view matrix; the email is sent as `?email=`.
    #[serde(default = "default_view_matrix_path")]
    pub view_matrix_path: String,
}

fn default_token() -> Secret<String> {
    Secret::new(String::new())
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_modules_path() -> String {
    "/api/modules".to_string()
}

fn default_pages_path() -> String {
    "/api/pages".to_string()
}

fn default_view_matrix_path() -> String {
    "/api/permissions/view-matrix".to_string()
}

impl ContentStoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct PermissionSettings {
    /// How long catalogs and view matrices are reused before re-fetching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Emails that bypass the permission matrix.
    #[serde(default)]
    pub super_admins: Vec<String>,
    /// URL slug → stored page code; replaces the built-in table when set.
    #[serde(default)]
    pub slug_aliases: Option<SlugAliases>,
    /// Retries after the first attempt for each upstream fetch.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            super_admins: Vec::new(),
            slug_aliases: None,
            max_retries: default_max_retries(),
        }
    }
}

impl PermissionSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn aliases(&self) -> SlugAliases {
        self.slug_aliases.clone().unwrap_or_default()
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::quick()
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP/gRPC collector; spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let configuration_directory = configuration_directory("portal-frontend")?;
    load_layered(&configuration_directory)
}

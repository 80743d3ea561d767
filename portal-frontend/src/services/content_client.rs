use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;
use service_core::observability::TracedClientExt;
use service_core::retry::{retry_call, RetryConfig};

use crate::config::ContentStoreSettings;
use crate::error::FetchError;
use crate::models::{Module, Page, ViewMatrix};
use crate::permissions::normalize::{normalize_modules, normalize_pages, normalize_view_matrix};

/// Where catalogs and view matrices come from.
///
/// Implementations return records already normalized to the internal
/// shapes.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn list_modules(&self) -> Result<Vec<Module>, FetchError>;

    async fn list_pages(&self) -> Result<Vec<Page>, FetchError>;

    async fn view_matrix(&self, email: &str) -> Result<ViewMatrix, FetchError>;
}

/// REST client for the CMS that owns modules, pages and view matrices.
pub struct ContentStoreClient {
    client: Client,
    settings: ContentStoreSettings,
    retry: RetryConfig,
}

impl ContentStoreClient {
    pub fn new(settings: ContentStoreSettings, retry: RetryConfig) -> Self {
        Self {
            client: Client::new(),
            settings,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.url
    }

    /// GET a JSON document, retrying transient failures.
    async fn get_json(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.settings.url.trim_end_matches('/'), path);

        retry_call(&self.retry, operation, || self.get_json_once(&url, query)).await
    }

    async fn get_json_once(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let mut request = self
            .client
            .traced_get(url)
            .query(query)
            .timeout(self.settings.timeout());

        let token = self.settings.token.expose_secret();
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send GET request to {}: {}", url, e);
            FetchError::Transport {
                endpoint: url.to_string(),
                source: e,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: url.to_string(),
                status,
            });
        }

        response.json().await.map_err(|e| FetchError::Decode {
            endpoint: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl PermissionSource for ContentStoreClient {
    async fn list_modules(&self) -> Result<Vec<Module>, FetchError> {
        let payload = self
            .get_json("list_modules", &self.settings.modules_path, &[])
            .await?;
        let modules = normalize_modules(&payload);
        tracing::debug!(count = modules.len(), "Fetched module catalog");
        Ok(modules)
    }

    async fn list_pages(&self) -> Result<Vec<Page>, FetchError> {
        let payload = self
            .get_json("list_pages", &self.settings.pages_path, &[])
            .await?;
        let pages = normalize_pages(&payload);
        tracing::debug!(count = pages.len(), "Fetched page catalog");
        Ok(pages)
    }

    async fn view_matrix(&self, email: &str) -> Result<ViewMatrix, FetchError> {
        let payload = self
            .get_json(
                "get_view_matrix",
                &self.settings.view_matrix_path,
                &[("email", email)],
            )
            .await?;
        let matrix = normalize_view_matrix(&payload);
        tracing::debug!(
            modules = matrix.modules.len(),
            pages = matrix.pages.len(),
            "Fetched view matrix"
        );
        Ok(matrix)
    }
}

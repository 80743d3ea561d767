//! Short-lived cache of permission snapshots.
//!
//! The module and page catalogs are shared by every user; view matrices are
//! per user. Each user gets one immutable [`PermissionSnapshot`] built from a
//! single catalog generation and a single matrix fetch, so a request never
//! sees an old matrix joined with a new catalog. Snapshots expire with the
//! oldest input they were built from. Failed fetches are never cached.
//!
//! Invalidation bumps a generation counter. A fetch that started before an
//! invalidation still answers its own request but is not written back.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::content_client::PermissionSource;
use super::metrics::record_fetch_failure;
use crate::models::{Identity, Module, Page, ViewMatrix};
use crate::permissions::{Fetch, PermissionSnapshot};

#[derive(Clone)]
struct CachedCatalog {
    modules: Arc<Vec<Module>>,
    pages: Arc<Vec<Page>>,
    expires_at: Instant,
}

struct CatalogFetch {
    modules: Fetch<Arc<Vec<Module>>>,
    pages: Fetch<Arc<Vec<Page>>>,
    expires_at: Option<Instant>,
}

struct CachedSnapshot {
    snapshot: Arc<PermissionSnapshot>,
    expires_at: Instant,
}

/// Generations observed when a fetch started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    all: u64,
    user: u64,
}

pub struct PermissionCache {
    source: Arc<dyn PermissionSource>,
    ttl: Duration,
    catalog: RwLock<Option<CachedCatalog>>,
    catalog_refresh: Mutex<()>,
    snapshots: DashMap<String, CachedSnapshot>,
    /// Bumped by `invalidate_all`.
    generation: AtomicU64,
    /// Bumped by `invalidate`; only users that were ever invalidated have an entry.
    user_generations: DashMap<String, u64>,
}

impl PermissionCache {
    pub fn new(source: Arc<dyn PermissionSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            catalog: RwLock::new(None),
            catalog_refresh: Mutex::new(()),
            snapshots: DashMap::new(),
            generation: AtomicU64::new(0),
            user_generations: DashMap::new(),
        }
    }

    /// The current snapshot for an identity, fetching whatever is stale.
    ///
    /// Anonymous identities get the catalog with the matrix left `Loading`.
    pub async fn snapshot_for(&self, identity: &Identity) -> Arc<PermissionSnapshot> {
        let key = identity.cache_key();

        if let Some(key) = &key {
            if let Some(snapshot) = self.fresh_snapshot(key) {
                return snapshot;
            }
        }

        let started = self.generation_of(key.as_deref());
        let (catalog, matrix) = tokio::join!(self.catalog(), self.matrix(key.as_deref()));

        let (matrix, matrix_expiry) = match matrix {
            Some((fetch, fetched_at)) => {
                let expiry = fetch.is_ready().then(|| fetched_at + self.ttl);
                (fetch, expiry)
            }
            None => (Fetch::Loading, None),
        };

        let snapshot = Arc::new(PermissionSnapshot::new(
            catalog.modules,
            catalog.pages,
            matrix,
        ));

        // Only complete snapshots are cached; anything pending is retried next time
        if let (Some(key), Some(catalog_expiry), Some(matrix_expiry)) =
            (key, catalog.expires_at, matrix_expiry)
        {
            // The generation check runs under the entry's shard lock, so an
            // invalidation either sees this insert and removes it, or this
            // insert sees the bumped generation and is skipped.
            let entry = self.snapshots.entry(key);
            if self.generation_of(Some(entry.key())) == started {
                entry.insert(CachedSnapshot {
                    snapshot: snapshot.clone(),
                    expires_at: catalog_expiry.min(matrix_expiry),
                });
            } else {
                tracing::debug!(
                    email = %entry.key(),
                    "Permissions invalidated during fetch, not caching"
                );
            }
        }

        snapshot
    }

    /// Drop one user's cached snapshot, e.g. after their matrix was edited.
    pub fn invalidate(&self, email: &str) {
        let key = email.to_lowercase();
        *self.user_generations.entry(key.clone()).or_insert(0) += 1;
        self.snapshots.remove(&key);
        tracing::info!(email = %email, "Invalidated cached permissions");
    }

    /// Drop the catalog and every snapshot, e.g. after modules or pages changed.
    pub async fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.catalog.write().await = None;
        self.snapshots.clear();
        tracing::info!("Invalidated all cached permissions");
    }

    pub fn cached_users(&self) -> usize {
        self.snapshots.len()
    }

    fn generation_of(&self, key: Option<&str>) -> Generation {
        Generation {
            all: self.generation.load(Ordering::SeqCst),
            user: key
                .and_then(|key| self.user_generations.get(key).map(|g| *g))
                .unwrap_or(0),
        }
    }

    fn fresh_snapshot(&self, key: &str) -> Option<Arc<PermissionSnapshot>> {
        let entry = self.snapshots.get(key)?;
        if entry.expires_at > Instant::now() {
            return Some(entry.snapshot.clone());
        }
        drop(entry);
        self.snapshots.remove(key);
        None
    }

    async fn cached_catalog(&self) -> Option<CachedCatalog> {
        self.catalog
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.expires_at > Instant::now())
            .cloned()
    }

    async fn catalog(&self) -> CatalogFetch {
        if let Some(cached) = self.cached_catalog().await {
            return cached.into();
        }

        // One refresh at a time; whoever waited re-checks before fetching
        let _guard = self.catalog_refresh.lock().await;
        if let Some(cached) = self.cached_catalog().await {
            return cached.into();
        }

        let started = self.generation.load(Ordering::SeqCst);
        let (modules, pages) = tokio::join!(self.source.list_modules(), self.source.list_pages());

        match (modules, pages) {
            (Ok(modules), Ok(pages)) => {
                let now = Instant::now();
                let cached = CachedCatalog {
                    modules: Arc::new(modules),
                    pages: Arc::new(pages),
                    expires_at: now + self.ttl,
                };

                let mut slot = self.catalog.write().await;
                // invalidate_all bumps before taking the write lock
                if self.generation.load(Ordering::SeqCst) != started {
                    tracing::debug!("Catalog invalidated during fetch, not caching");
                    return CatalogFetch {
                        modules: Fetch::Ready(cached.modules),
                        pages: Fetch::Ready(cached.pages),
                        expires_at: None,
                    };
                }
                *slot = Some(cached.clone());
                drop(slot);

                // Expired snapshots are otherwise only dropped when their user returns
                self.snapshots.retain(|_, snapshot| snapshot.expires_at > now);

                tracing::info!(
                    modules = cached.modules.len(),
                    pages = cached.pages.len(),
                    cached_users = self.snapshots.len(),
                    "Refreshed module and page catalogs"
                );
                cached.into()
            }
            (modules, pages) => {
                if let Err(e) = &modules {
                    tracing::warn!(error = %e, "Module catalog unavailable");
                    record_fetch_failure("modules");
                }
                if let Err(e) = &pages {
                    tracing::warn!(error = %e, "Page catalog unavailable");
                    record_fetch_failure("pages");
                }
                CatalogFetch {
                    modules: modules.map(Arc::new).into(),
                    pages: pages.map(Arc::new).into(),
                    expires_at: None,
                }
            }
        }
    }

    /// `None` when there is no identity to fetch a matrix for.
    async fn matrix(&self, email: Option<&str>) -> Option<(Fetch<Arc<ViewMatrix>>, Instant)> {
        let email = email?;
        let fetched_at = Instant::now();

        let fetch = match self.source.view_matrix(email).await {
            Ok(matrix) => Fetch::Ready(Arc::new(matrix)),
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "View matrix unavailable");
                record_fetch_failure("view_matrix");
                Fetch::Failed(e.to_string())
            }
        };

        Some((fetch, fetched_at))
    }
}

impl From<CachedCatalog> for CatalogFetch {
    fn from(cached: CachedCatalog) -> Self {
        Self {
            modules: Fetch::Ready(cached.modules),
            pages: Fetch::Ready(cached.pages),
            expires_at: Some(cached.expires_at),
        }
    }
}

use std::sync::Arc;

use super::derive::{derive_state, DerivedPermissions};
use crate::models::{Module, Page, ViewMatrix};

/// Readiness of one upstream input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    /// Not fetched yet (or not fetchable, e.g. no identity for the matrix).
    Loading,
    Ready(T),
    /// Fetch failed after retries; the message is for logs and API callers.
    Failed(String),
}

impl<T> Fetch<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Fetch::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Fetch::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Fetch::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Fetch::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Fetch<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Fetch::Ready(value),
            Err(err) => Fetch::Failed(err.to_string()),
        }
    }
}

/// One consistent view of (modules, pages, matrix) for one user.
///
/// Derived permissions are computed once, when the snapshot is built, and
/// never recomputed for it; a change upstream produces a new snapshot.
#[derive(Debug, Clone)]
pub struct PermissionSnapshot {
    pub modules: Fetch<Arc<Vec<Module>>>,
    pub pages: Fetch<Arc<Vec<Page>>>,
    pub matrix: Fetch<Arc<ViewMatrix>>,
    derived: DerivedPermissions,
}

impl PermissionSnapshot {
    pub fn new(
        modules: Fetch<Arc<Vec<Module>>>,
        pages: Fetch<Arc<Vec<Page>>>,
        matrix: Fetch<Arc<ViewMatrix>>,
    ) -> Self {
        let empty_matrix = ViewMatrix::default();
        let derived = derive_state(
            modules.ready().map(|m| m.as_slice()).unwrap_or(&[]),
            pages.ready().map(|p| p.as_slice()).unwrap_or(&[]),
            matrix.ready().map(|m| m.as_ref()).unwrap_or(&empty_matrix),
        );

        Self {
            modules,
            pages,
            matrix,
            derived,
        }
    }

    /// Nothing fetched yet.
    pub fn loading() -> Self {
        Self::new(Fetch::Loading, Fetch::Loading, Fetch::Loading)
    }

    pub fn derived(&self) -> &DerivedPermissions {
        &self.derived
    }

    /// Any of the three inputs still in flight.
    pub fn is_loading(&self) -> bool {
        self.modules.is_loading() || self.pages.is_loading() || self.matrix.is_loading()
    }

    /// Any input not ready, whether in flight or failed.
    pub fn is_pending(&self) -> bool {
        !(self.modules.is_ready() && self.pages.is_ready() && self.matrix.is_ready())
    }

    pub fn catalogs_ready(&self) -> bool {
        self.modules.is_ready() && self.pages.is_ready()
    }

    /// Upstream failures, labelled by source.
    pub fn errors(&self) -> Vec<(&'static str, &str)> {
        [
            ("modules", self.modules.error()),
            ("pages", self.pages.error()),
            ("view_matrix", self.matrix.error()),
        ]
        .into_iter()
        .filter_map(|(source, error)| error.map(|e| (source, e)))
        .collect()
    }
}

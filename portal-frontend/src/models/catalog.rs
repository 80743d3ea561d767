//! Catalog records and the per-user view matrix, after boundary normalization.
//!
//! These are immutable value objects. Anything fetched from the content store
//! goes through [`crate::permissions::normalize`] before it becomes one of
//! these types.

use serde::{Deserialize, Serialize};

/// Top-level navigable section of the portal (first URL segment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub module_id: i64,
    pub module_code: String,
    pub module_name: String,
}

/// Sub-section of a module (second URL segment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_id: i64,
    pub page_code: String,
    pub page_name: String,
    pub module_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Module,
    Page,
}

/// One explicit allow/deny rule for a module or page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMatrixEntry {
    pub entity_type: EntityType,
    pub target: i64,
    pub can_view: bool,
}

/// A user's explicit rules, split by entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMatrix {
    #[serde(rename = "MODULE", default)]
    pub modules: Vec<ViewMatrixEntry>,
    #[serde(rename = "PAGE", default)]
    pub pages: Vec<ViewMatrixEntry>,
}

impl ViewMatrix {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.pages.is_empty()
    }
}

/// A module joined with the user's rule for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePermission {
    pub module_id: i64,
    /// Lower-cased, spaces replaced by hyphens; matches the first URL segment.
    pub module_code: String,
    pub module_name: String,
    pub can_view: bool,
}

/// A page joined with the user's rule for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePermission {
    pub page_id: i64,
    pub page_code: String,
    pub page_name: String,
    /// Lower-cased page code.
    pub slug: String,
    pub module_id: i64,
    pub can_view: bool,
}

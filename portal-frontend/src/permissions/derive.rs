use std::collections::HashMap;

use crate::models::{Module, ModulePermission, Page, PagePermission, ViewMatrix, ViewMatrixEntry};

/// Catalog joined with one user's view matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedPermissions {
    pub modules: Vec<ModulePermission>,
    pub pages: Vec<PagePermission>,
}

impl DerivedPermissions {
    pub fn module_by_id(&self, module_id: i64) -> Option<&ModulePermission> {
        self.modules.iter().find(|m| m.module_id == module_id)
    }

    pub fn page_by_id(&self, page_id: i64) -> Option<&PagePermission> {
        self.pages.iter().find(|p| p.page_id == page_id)
    }

    /// Case-insensitive match on the normalized module code.
    pub fn module_by_code(&self, code: &str) -> Option<&ModulePermission> {
        let code = normalize_module_code(code);
        self.modules.iter().find(|m| m.module_code == code)
    }

    pub fn pages_of(&self, module_id: i64) -> impl Iterator<Item = &PagePermission> {
        self.pages.iter().filter(move |p| p.module_id == module_id)
    }
}

/// Join modules and pages with the user's explicit rules.
///
/// Modules and pages without a rule get `can_view = false`. When the matrix
/// lists the same target twice the last entry wins.
pub fn derive_state(modules: &[Module], pages: &[Page], matrix: &ViewMatrix) -> DerivedPermissions {
    let module_rules = rule_map(&matrix.modules);
    let page_rules = rule_map(&matrix.pages);

    let modules = modules
        .iter()
        .map(|module| ModulePermission {
            module_id: module.module_id,
            module_code: normalize_module_code(&module.module_code),
            module_name: module.module_name.clone(),
            can_view: module_rules.get(&module.module_id).copied().unwrap_or(false),
        })
        .collect();

    let pages = pages
        .iter()
        .map(|page| PagePermission {
            page_id: page.page_id,
            page_code: page.page_code.clone(),
            page_name: page.page_name.clone(),
            slug: page.page_code.to_lowercase(),
            module_id: page.module_id,
            can_view: page_rules.get(&page.page_id).copied().unwrap_or(false),
        })
        .collect();

    DerivedPermissions { modules, pages }
}

fn rule_map(entries: &[ViewMatrixEntry]) -> HashMap<i64, bool> {
    entries
        .iter()
        .map(|entry| (entry.target, entry.can_view))
        .collect()
}

/// Lower-case and replace spaces with hyphens so codes line up with URL segments.
pub fn normalize_module_code(code: &str) -> String {
    code.trim().to_lowercase().replace(' ', "-")
}

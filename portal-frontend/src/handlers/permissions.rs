use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::{Validate, ValidationError};

use crate::models::{Identity, ModulePermission, PagePermission};
use crate::permissions::{AccessDecision, PermissionResolver};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPermissionsResponse {
    pub identity: Identity,
    pub loading: bool,
    pub modules: Vec<ModulePermission>,
    pub pages: Vec<PagePermission>,
    pub visible_modules: Vec<ModulePermission>,
}

/// The caller's derived permissions, for navigation menus.
///
/// GET /api/permissions/me
pub async fn my_permissions(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<MyPermissionsResponse>, AppError> {
    let snapshot = state.cache.snapshot_for(&identity).await;

    let errors = snapshot.errors();
    if !errors.is_empty() {
        let message = errors
            .iter()
            .map(|(source, error)| format!("{}: {}", source, error))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::BadGateway(message));
    }

    let resolver = PermissionResolver::new(&identity, &snapshot, &state.aliases);
    let derived = snapshot.derived();

    Ok(Json(MyPermissionsResponse {
        loading: resolver.is_loading(),
        modules: derived.modules.clone(),
        pages: derived.pages.clone(),
        visible_modules: resolver.visible_modules().into_iter().cloned().collect(),
        identity,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckQuery {
    #[validate(length(min = 1), custom(function = "validate_route_path"))]
    pub path: String,
}

fn validate_route_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("route_path"))
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub path: String,
    pub allowed: bool,
    pub reason: &'static str,
    pub module: Option<ModulePermission>,
    pub page: Option<PagePermission>,
}

/// Would the caller be let through to `path`?
///
/// GET /api/permissions/check?path=/catalogue/all
pub async fn check_route(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<CheckQuery>,
) -> Result<Json<CheckResponse>, AppError> {
    query.validate()?;

    let snapshot = state.cache.snapshot_for(&identity).await;
    let resolver = PermissionResolver::new(&identity, &snapshot, &state.aliases);

    let decision = resolver.decide(&query.path);
    let reason = match &decision {
        AccessDecision::Allowed(reason) => reason.as_str(),
        AccessDecision::Denied { page: Some(_), .. } => "page_denied",
        AccessDecision::Denied { page: None, .. } => "module_denied",
    };

    Ok(Json(CheckResponse {
        allowed: decision.is_allowed(),
        reason,
        module: resolver.module_for_route(&query.path).cloned(),
        page: resolver.page_for_route(&query.path).cloned(),
        path: query.path,
    }))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshScope {
    #[default]
    Me,
    All,
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub scope: RefreshScope,
}

/// Drop cached permissions so the next request re-fetches them.
///
/// POST /api/permissions/refresh[?scope=all]
pub async fn refresh(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<RefreshQuery>,
) -> Result<impl IntoResponse, AppError> {
    match query.scope {
        RefreshScope::Me => {
            let email = identity.email.as_deref().ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("No identity to refresh permissions for"))
            })?;
            state.cache.invalidate(email);
        }
        RefreshScope::All => {
            if !identity.is_super_admin {
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "Only super-admins can refresh the shared catalog"
                )));
            }
            state.cache.invalidate_all().await;
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_query_requires_absolute_path() {
        let ok = CheckQuery {
            path: "/news".into(),
        };
        assert!(ok.validate().is_ok());

        let relative = CheckQuery {
            path: "news".into(),
        };
        assert!(relative.validate().is_err());

        let empty = CheckQuery { path: String::new() };
        assert!(empty.validate().is_err());
    }
}

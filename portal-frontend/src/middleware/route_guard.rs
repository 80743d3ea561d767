use askama::Template;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::models::{Identity, ModulePermission, PagePermission};
use crate::permissions::{AccessDecision, PermissionResolver};
use crate::services::metrics::record_access_decision;
use crate::AppState;

/// Path prefixes that are not portal navigation and are never guarded.
const EXEMPT_PREFIXES: &[&str] = &["/api", "/health", "/metrics", "/static"];

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

#[derive(Template)]
#[template(path = "access_denied.html")]
pub struct AccessDeniedTemplate {
    pub module_name: String,
    pub page_name: Option<String>,
    pub path: String,
}

impl AccessDeniedTemplate {
    pub fn new(module: &ModulePermission, page: Option<&PagePermission>, path: &str) -> Self {
        Self {
            module_name: module.module_name.clone(),
            page_name: page.map(|p| p.page_name.clone()),
            path: path.to_string(),
        }
    }
}

/// Guard portal navigation with the caller's permission snapshot.
///
/// Only an explicit denial blocks; fetch failures are logged and the request
/// goes through.
pub async fn route_guard(
    State(state): State<AppState>,
    identity: Identity,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if is_exempt(&path) {
        return next.run(req).await;
    }

    let snapshot = state.cache.snapshot_for(&identity).await;
    for (source, error) in snapshot.errors() {
        tracing::warn!(
            path = %path,
            source = source,
            error = error,
            "Permission data unavailable, allowing navigation"
        );
    }

    let resolver = PermissionResolver::new(&identity, &snapshot, &state.aliases);
    let decision = resolver.decide(&path);
    record_access_decision(&decision);

    match decision {
        AccessDecision::Allowed(reason) => {
            tracing::debug!(path = %path, reason = reason.as_str(), "Route allowed");
            next.run(req).await
        }
        AccessDecision::Denied { module, page } => {
            tracing::info!(
                path = %path,
                email = identity.email.as_deref().unwrap_or("-"),
                module = %module.module_code,
                page = page.as_ref().map(|p| p.slug.as_str()).unwrap_or("-"),
                "Route denied"
            );
            (
                StatusCode::FORBIDDEN,
                AccessDeniedTemplate::new(&module, page.as_ref(), &path),
            )
                .into_response()
        }
    }
}

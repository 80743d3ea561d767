use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use serde::Serialize;
use std::collections::HashSet;
use std::convert::Infallible;

use crate::AppState;

/// Header carrying the authenticated email, set by the identity proxy.
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Header carrying the internal numeric user id, set by the identity proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The principal a request is made on behalf of.
///
/// The portal trusts the identity proxy in front of it; a request without an
/// email header is anonymous, which the resolver treats as "identity not yet
/// resolved".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub is_super_admin: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(email: impl Into<String>, super_admins: &SuperAdmins) -> Self {
        let email = email.into();
        let is_super_admin = super_admins.contains(&email);
        Self {
            email: Some(email),
            user_id: None,
            is_super_admin,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn from_headers(headers: &HeaderMap, super_admins: &SuperAdmins) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match header(USER_EMAIL_HEADER) {
            Some(email) => {
                let identity = Identity::new(email, super_admins);
                match header(USER_ID_HEADER) {
                    Some(user_id) => identity.with_user_id(user_id),
                    None => identity,
                }
            }
            None => Identity::anonymous(),
        }
    }

    /// Lower-cased email used to key the view-matrix cache.
    pub fn cache_key(&self) -> Option<String> {
        self.email.as_ref().map(|email| email.to_lowercase())
    }
}

/// Emails that bypass the permission matrix entirely.
#[derive(Debug, Clone, Default)]
pub struct SuperAdmins(HashSet<String>);

impl SuperAdmins {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            emails
                .into_iter()
                .map(|email| email.as_ref().trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, email: &str) -> bool {
        self.0.contains(&email.trim().to_lowercase())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Identity::from_headers(&parts.headers, &state.super_admins))
    }
}

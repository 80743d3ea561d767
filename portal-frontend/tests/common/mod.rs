#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use portal_frontend::config::Settings;
use portal_frontend::models::identity::USER_EMAIL_HEADER;
use portal_frontend::startup::build_router;
use portal_frontend::AppState;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_EMAIL: &str = "jane.doe@corp.example";
pub const ADMIN_EMAIL: &str = "root@corp.example";

pub fn settings(cms_url: &str) -> Settings {
    serde_json::from_value(json!({
        "server": {
            "host": "127.0.0.1",
            "port": 0,
            "static_dir": concat!(env!("CARGO_MANIFEST_DIR"), "/static"),
        },
        "content_store": {
            "url": cms_url,
            "token": "cms-service-token",
            "timeout_secs": 2,
        },
        "permissions": {
            "super_admins": [ADMIN_EMAIL],
            "max_retries": 1,
        },
    }))
    .expect("test settings are valid")
}

pub fn app(cms: &MockServer) -> Router {
    build_router(AppState::from_settings(&settings(&cms.uri())))
}

/// Catalogue (1) with pages offices (10) and catalogue_all (11); News (2)
/// with page latest (20).
pub fn modules_payload() -> Value {
    json!({
        "data": [
            { "moduleId": 1, "moduleCode": "catalogue", "moduleName": "Catalogue" },
            { "ModuleID": "2", "module_code": "News", "module_name": "News" },
        ]
    })
}

pub fn pages_payload() -> Value {
    json!([
        { "pageId": 10, "pageCode": "offices", "pageName": "Offices", "moduleId": 1 },
        { "pageId": 11, "pageCode": "catalogue_all", "pageName": "All products", "moduleId": 1 },
        { "pageId": 20, "pageCode": "latest", "pageName": "Latest", "moduleId": "2" },
    ])
}

/// Catalogue allowed except its offices page; News denied outright even
/// though its page is allowed.
pub fn matrix_payload() -> Value {
    json!({
        "MODULE": [
            { "target": 1, "canView": true },
            { "target": "2", "canView": false },
        ],
        "PAGE": [
            { "target": 10, "canView": false },
            { "target": "11", "canView": true },
            { "target": 20, "canView": true },
        ]
    })
}

pub async fn mount_catalog(cms: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/modules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(modules_payload()))
        .mount(cms)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pages_payload()))
        .mount(cms)
        .await;
}

pub async fn mount_matrix(cms: &MockServer, email: &str, payload: Value) {
    Mock::given(method("GET"))
        .and(path("/api/permissions/view-matrix"))
        .and(query_param("email", email))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(cms)
        .await;
}

/// Content store with the catalog and the default user's matrix.
pub async fn portal_cms() -> MockServer {
    let cms = MockServer::start().await;
    mount_catalog(&cms).await;
    mount_matrix(&cms, USER_EMAIL, matrix_payload()).await;
    cms
}

pub fn request(method: Method, uri: &str, email: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(email) = email {
        builder = builder.header(USER_EMAIL_HEADER, email);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn get(uri: &str, email: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, email)
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

//! Embedded image-registry surface: authentication for `/v2/...`.
//!
//! Blob and manifest storage live in an external registry backend; this
//! module owns the auth boundary and the version-check endpoint. Everything
//! under `/v2` passes through [`auth::registry_auth`].

pub mod auth;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::any,
};
use rand::distr::{Alphanumeric, SampleString};
use serde_json::json;

/// Per-instance Basic credentials used only by the node itself, over
/// loopback, to pull its own images. Generated at startup; never written to
/// any configuration surface.
#[derive(Debug, Clone)]
pub struct InternalCredentials {
    /// Generated username
    pub username: String,
    /// Generated password
    pub password: String,
}

impl InternalCredentials {
    /// Generate fresh random credentials.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self {
            username: Alphanumeric.sample_string(&mut rng, 16),
            password: Alphanumeric.sample_string(&mut rng, 32),
        }
    }
}

/// Build the `/v2` router with the auth middleware applied.
///
/// Routes are merged (not nested) into the main app so the middleware sees
/// full request paths when extracting repository names.
pub fn router(state: Arc<auth::RegistryAuthState>) -> Router {
    Router::new()
        .route("/v2", any(api_version))
        .route("/v2/", any(api_version))
        .route("/v2/{*rest}", any(backend_unwired))
        .layer(middleware::from_fn_with_state(state, auth::registry_auth))
}

/// Docker v2 API version check. Reaching this handler means auth passed.
async fn api_version() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({})))
}

/// Storage paths answered when no registry backend is mounted over them.
async fn backend_unwired() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "not found"})),
    )
}

//! Admin control surface.
//!
//! A fixed resource taxonomy dispatched under `/admin`:
//!
//! | Subpath | Methods | Permission |
//! |---------|---------|------------|
//! | `/routes` | GET, POST | routes:read / routes:write |
//! | `/routes/{domain}` | GET, PUT, DELETE | routes:read / routes:write |
//! | `/routes/{domain}/attachments` | GET | routes:read |
//! | `/secrets/{domain}` | GET, POST | secrets:read / secrets:write |
//! | `/secrets/{domain}/{key}` | DELETE | secrets:write |
//! | `/networks`, `/status`, `/health` | GET | status:read |
//! | `/config` | GET | config:read |
//! | `/reload`, `/deploy/{domain}` | POST | config:write |
//! | `/logs`, `/logs/{domain}` | GET | status:read |
//! | `/images` | GET | status:read (503 when unwired) |
//! | `/backups` | GET, POST | config:read / config:write (503 when unwired) |
//!
//! Every non-2xx response is `{"error": "<message>"}` with a JSON content
//! type; collaborator error text never reaches a 500 body.

mod logs;
mod routes;
mod secrets;
mod system;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;
use tracing::{error, warn};

use crate::auth::AuthContext;
use crate::health::HealthEngine;
use crate::security::scope::has_access;
use crate::service::{
    BackupService, ConfigService, ContainerService, EventPublisher, LogService, RegistryService,
    SecretService,
};

/// Ceiling on JSON request bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Collaborators available to the admin handlers.
pub struct AdminState {
    /// Route set and server settings
    pub config: Arc<dyn ConfigService>,
    /// Container runtime projection
    pub containers: Arc<dyn ContainerService>,
    /// Per-route secrets
    pub secrets: Arc<dyn SecretService>,
    /// Process and container logs
    pub logs: Arc<dyn LogService>,
    /// Health engine over all routes
    pub health: Arc<HealthEngine>,
    /// Event bus; reload still succeeds when unwired
    pub events: Option<Arc<dyn EventPublisher>>,
    /// Embedded registry introspection (optional)
    pub registry: Option<Arc<dyn RegistryService>>,
    /// Backup execution (optional)
    pub backups: Option<Arc<dyn BackupService>>,
}

/// Build the admin router. Mounted under `/admin` by the server; the auth
/// pipeline is layered on top there.
pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route(
            "/routes",
            get(routes::list)
                .post(routes::create)
                .fallback(method_not_allowed),
        )
        .route(
            "/routes/{domain}",
            get(routes::get_one)
                .put(routes::update)
                .delete(routes::remove)
                .fallback(method_not_allowed),
        )
        .route(
            "/routes/{domain}/attachments",
            get(routes::attachments).fallback(method_not_allowed),
        )
        .route(
            "/secrets/{domain}",
            get(secrets::list_keys)
                .post(secrets::set)
                .fallback(method_not_allowed),
        )
        .route(
            "/secrets/{domain}/{key}",
            delete(secrets::remove).fallback(method_not_allowed),
        )
        .route("/networks", get(system::networks).fallback(method_not_allowed))
        .route("/status", get(system::status).fallback(method_not_allowed))
        .route("/health", get(system::health).fallback(method_not_allowed))
        .route("/config", get(system::config_snapshot).fallback(method_not_allowed))
        .route("/reload", post(system::reload).fallback(method_not_allowed))
        .route(
            "/deploy/{domain}",
            post(system::deploy).fallback(method_not_allowed),
        )
        .route("/logs", get(logs::process).fallback(method_not_allowed))
        .route(
            "/logs/{domain}",
            get(logs::container).fallback(method_not_allowed),
        )
        .route("/images", get(system::images).fallback(method_not_allowed))
        .route(
            "/backups",
            get(system::list_backups)
                .post(system::create_backup)
                .fallback(method_not_allowed),
        )
        .fallback(unknown_route)
        .with_state(state)
}

// ── Error envelope ────────────────────────────────────────────────────────

/// An admin error response: status plus the uniform JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 400 with a caller-visible message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 404 with a caller-visible message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// 500 with a fixed phrase. The real error goes to the log, never the
    /// response.
    pub fn internal(action: &str, err: &crate::Error) -> Self {
        error!(error = %err, "Failed to {action}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("failed to {action}"),
        }
    }

    /// Map a collaborator error onto the taxonomy: sentinel values pick the
    /// status and message, everything else becomes `failed to <action>`.
    pub fn from_error(err: crate::Error, action: &str) -> Self {
        use crate::Error;
        match err {
            Error::RouteDomainEmpty | Error::RouteImageEmpty | Error::ManifestNotFound(_) => Self {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            },
            Error::RouteNotFound(_) => Self::not_found("route not found"),
            Error::ContainerNotFound(_) => Self::not_found("container not found"),
            Error::ServiceUnavailable(_) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
            },
            other => Self::internal(action, &other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

// ── Shared handler plumbing ───────────────────────────────────────────────

/// Per-resource permission check. The pipeline already guaranteed an admin
/// scope exists; this matches the concrete `(resource, action)` pair.
pub fn require(context: &AuthContext, resource: &str, action: &str) -> Result<(), ApiError> {
    if has_access(&context.scopes, resource, action) {
        return Ok(());
    }
    warn!(
        subject = %context.subject,
        resource = %resource,
        action = %action,
        "Permission denied"
    );
    Err(ApiError {
        status: StatusCode::FORBIDDEN,
        message: format!("insufficient permissions for {resource}:{action}"),
    })
}

/// Reject empty and traversal-carrying domains before any collaborator call.
pub fn validate_domain(domain: &str) -> Result<(), ApiError> {
    if domain.trim().is_empty() || domain.contains("..") || domain.contains('/') {
        return Err(ApiError::bad_request("invalid domain"));
    }
    Ok(())
}

/// Collect at most [`MAX_BODY_BYTES`] of the body and decode it as JSON.
/// Oversized and malformed bodies are indistinguishable to the caller.
pub async fn decode_json<T: serde::de::DeserializeOwned>(body: Body) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            warn!(error = %e, "Request body rejected");
            ApiError::bad_request("invalid JSON")
        })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!(error = %e, "JSON decode failed");
        ApiError::bad_request("invalid JSON")
    })
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "method not allowed"})),
    )
        .into_response()
}

async fn unknown_route() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "route not found"})),
    )
        .into_response()
}

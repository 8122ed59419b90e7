//! Status, networks, config, health, reload, deploy and the optional
//! images/backups resources.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::{AdminState, ApiError, require, validate_domain};
use crate::auth::AuthContext;
use crate::events::{Event, EventKind};
use crate::model::{Route, RouteStatus};

/// `GET /admin/status` — every route joined with its container status.
pub(super) async fn status(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "status", "read")?;

    let routes = state
        .config
        .routes()
        .await
        .map_err(|e| ApiError::from_error(e, "get status"))?;

    let mut statuses = Vec::with_capacity(routes.len());
    for route in routes {
        let container = state
            .containers
            .get(&route.domain)
            .await
            .map_err(|e| ApiError::from_error(e, "get status"))?;
        statuses.push(RouteStatus {
            domain: route.domain,
            image: route.image,
            https: route.https,
            container_status: container
                .as_ref()
                .map_or_else(|| "not found".to_string(), |c| c.status.clone()),
            container_id: container.map(|c| c.id),
        });
    }

    Ok(Json(statuses).into_response())
}

/// `GET /admin/networks` — container networks, cloned out of the runtime
/// projection so callers can never alias runtime state.
pub(super) async fn networks(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "status", "read")?;

    let networks = state
        .containers
        .list_networks()
        .await
        .map_err(|e| ApiError::from_error(e, "list networks"))?;
    Ok(Json(networks).into_response())
}

/// `GET /admin/health` — run the health engine over all routes.
pub(super) async fn health(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "status", "read")?;

    let results = state
        .health
        .check_all_routes()
        .await
        .map_err(|e| ApiError::from_error(e, "check health"))?;
    Ok(Json(results).into_response())
}

/// Server configuration snapshot returned by `GET /admin/config`.
#[derive(Debug, Serialize)]
struct ConfigSnapshot {
    server_port: u16,
    registry_domain: String,
    registry_port: u16,
    data_dir: String,
    network_prefix: String,
    auto_route: bool,
    network_isolation: bool,
    routes: Vec<Route>,
    external_routes: Vec<Route>,
}

/// `GET /admin/config` — full configuration snapshot.
pub(super) async fn config_snapshot(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "config", "read")?;

    let routes = state
        .config
        .routes()
        .await
        .map_err(|e| ApiError::from_error(e, "get config"))?;

    let snapshot = ConfigSnapshot {
        server_port: state.config.server_port(),
        registry_domain: state.config.registry_domain(),
        registry_port: state.config.registry_port(),
        data_dir: state.config.data_dir().display().to_string(),
        network_prefix: state.config.network_prefix(),
        auto_route: state.config.auto_route_enabled(),
        network_isolation: state.config.network_isolation_enabled(),
        routes,
        external_routes: state.config.external_routes(),
    };

    Ok(Json(snapshot).into_response())
}

/// `POST /admin/reload` — reload config from file and nudge the container
/// subsystem to start anything missing. Running containers are untouched.
pub(super) async fn reload(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "config", "write")?;

    state
        .config
        .load()
        .await
        .map_err(|e| ApiError::internal("reload config", &e))?;

    if let Some(ref events) = state.events {
        if let Err(e) = events.publish(Event::new(EventKind::ManualReload)) {
            warn!(error = %e, "Failed to publish manual-reload event");
        }
    }

    info!("Configuration reloaded");
    Ok(Json(json!({"status": "reloaded"})).into_response())
}

/// `POST /admin/deploy/{domain}` — deploy the route's current image.
pub(super) async fn deploy(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    require(&context, "config", "write")?;
    validate_domain(&domain)?;

    let route = state
        .config
        .route(&domain)
        .await
        .map_err(|e| ApiError::from_error(e, "deploy route"))?;

    state
        .containers
        .deploy(&route)
        .await
        .map_err(|e| ApiError::from_error(e, "deploy route"))?;

    info!(domain = %domain, image = %route.image, "Route deployed");
    Ok(Json(json!({"status": "deployed", "domain": domain, "image": route.image}))
        .into_response())
}

/// `GET /admin/images` — repositories in the embedded registry.
pub(super) async fn images(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "status", "read")?;

    let Some(ref registry) = state.registry else {
        return Err(ApiError::from_error(
            crate::Error::ServiceUnavailable("registry service"),
            "list images",
        ));
    };

    let images = registry
        .list_images()
        .await
        .map_err(|e| ApiError::from_error(e, "list images"))?;
    Ok(Json(images).into_response())
}

/// `GET /admin/backups` — previously created backups.
pub(super) async fn list_backups(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "config", "read")?;

    let Some(ref backups) = state.backups else {
        return Err(ApiError::from_error(
            crate::Error::ServiceUnavailable("backup service"),
            "list backups",
        ));
    };

    let list = backups
        .list_backups()
        .await
        .map_err(|e| ApiError::from_error(e, "list backups"))?;
    Ok(Json(list).into_response())
}

/// `POST /admin/backups` — create a backup now.
pub(super) async fn create_backup(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    require(&context, "config", "write")?;

    let Some(ref backups) = state.backups else {
        return Err(ApiError::from_error(
            crate::Error::ServiceUnavailable("backup service"),
            "create backup",
        ));
    };

    let info = backups
        .create_backup()
        .await
        .map_err(|e| ApiError::from_error(e, "create backup"))?;

    info!(backup = %info.id, "Backup created");
    Ok((StatusCode::CREATED, Json(info)).into_response())
}

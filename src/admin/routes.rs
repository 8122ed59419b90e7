//! Route CRUD handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{AdminState, ApiError, decode_json, require, validate_domain};
use crate::auth::AuthContext;
use crate::model::Route;

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    #[serde(default)]
    detailed: bool,
}

/// `GET /admin/routes` — list routes; `?detailed=true` joins containers and
/// attachments.
pub(super) async fn list(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    require(&context, "routes", "read")?;

    if query.detailed {
        let details = state
            .containers
            .list_routes_with_details()
            .await
            .map_err(|e| ApiError::from_error(e, "list routes"))?;
        return Ok(Json(details).into_response());
    }

    let routes = state
        .config
        .routes()
        .await
        .map_err(|e| ApiError::from_error(e, "list routes"))?;
    Ok(Json(routes).into_response())
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateQuery {
    #[serde(default)]
    idempotent: bool,
}

/// `POST /admin/routes` — create a route from the JSON body.
pub(super) async fn create(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Query(query): Query<CreateQuery>,
    body: Body,
) -> Result<Response, ApiError> {
    require(&context, "routes", "write")?;

    let route: Route = decode_json(body).await?;
    route
        .validate()
        .map_err(|e| ApiError::from_error(e, "add route"))?;

    if query.idempotent {
        if let Ok(existing) = state.config.route(&route.domain).await {
            if existing.image == route.image {
                return Ok((StatusCode::OK, Json(existing)).into_response());
            }
        }
    }

    state
        .config
        .add_route(route.clone())
        .await
        .map_err(|e| ApiError::from_error(e, "add route"))?;

    info!(domain = %route.domain, image = %route.image, "Route created");
    Ok((StatusCode::CREATED, Json(route)).into_response())
}

/// `GET /admin/routes/{domain}` — fetch one route.
pub(super) async fn get_one(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    require(&context, "routes", "read")?;
    validate_domain(&domain)?;

    let route = state
        .config
        .route(&domain)
        .await
        .map_err(|e| ApiError::from_error(e, "get route"))?;
    Ok(Json(route).into_response())
}

/// `GET /admin/routes/{domain}/attachments` — list a route's attachments.
pub(super) async fn attachments(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    require(&context, "routes", "read")?;
    validate_domain(&domain)?;

    let attachments = state
        .containers
        .list_attachments(&domain)
        .await
        .map_err(|e| ApiError::from_error(e, "list attachments"))?;
    Ok(Json(attachments).into_response())
}

/// `PUT /admin/routes/{domain}` — replace a route. The URL domain always
/// wins over whatever the body claims.
pub(super) async fn update(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
    body: Body,
) -> Result<Response, ApiError> {
    require(&context, "routes", "write")?;
    validate_domain(&domain)?;

    let mut route: Route = decode_json(body).await?;
    route.domain = domain;
    route
        .validate()
        .map_err(|e| ApiError::from_error(e, "update route"))?;

    state
        .config
        .update_route(route.clone())
        .await
        .map_err(|e| ApiError::from_error(e, "update route"))?;

    info!(domain = %route.domain, image = %route.image, "Route updated");
    Ok(Json(route).into_response())
}

/// `DELETE /admin/routes/{domain}` — remove a route and its attachments.
pub(super) async fn remove(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    require(&context, "routes", "write")?;
    validate_domain(&domain)?;

    state
        .config
        .remove_route(&domain)
        .await
        .map_err(|e| ApiError::from_error(e, "remove route"))?;

    info!(domain = %domain, "Route removed");
    Ok(Json(json!({"status": "deleted", "domain": domain})).into_response())
}

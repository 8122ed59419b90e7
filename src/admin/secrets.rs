//! Secret handlers. The admin surface only ever exposes key names; values
//! flow exclusively from the secret store into container environments.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::info;

use super::{AdminState, ApiError, decode_json, require, validate_domain};
use crate::auth::AuthContext;

/// `GET /admin/secrets/{domain}` — list key names only.
pub(super) async fn list_keys(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    require(&context, "secrets", "read")?;
    validate_domain(&domain)?;

    let keys = state
        .secrets
        .list_keys(&domain)
        .await
        .map_err(|e| ApiError::from_error(e, "list secrets"))?;
    Ok(Json(json!({"domain": domain, "keys": keys})).into_response())
}

/// `POST /admin/secrets/{domain}` — merge a `{key: value}` map.
pub(super) async fn set(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
    body: Body,
) -> Result<Response, ApiError> {
    require(&context, "secrets", "write")?;
    validate_domain(&domain)?;

    let secrets: HashMap<String, String> = decode_json(body).await?;
    let count = secrets.len();

    state
        .secrets
        .set(&domain, secrets)
        .await
        .map_err(|e| ApiError::from_error(e, "set secrets"))?;

    info!(domain = %domain, count, "Secrets updated");
    Ok(Json(json!({"status": "updated", "domain": domain})).into_response())
}

/// `DELETE /admin/secrets/{domain}/{key}` — remove one key.
pub(super) async fn remove(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path((domain, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    require(&context, "secrets", "write")?;
    validate_domain(&domain)?;

    state
        .secrets
        .delete(&domain, &key)
        .await
        .map_err(|e| ApiError::from_error(e, "delete secret"))?;

    info!(domain = %domain, key = %key, "Secret deleted");
    Ok(Json(json!({"status": "deleted", "domain": domain, "key": key})).into_response())
}

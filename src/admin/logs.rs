//! Process and container log handlers, with SSE follow mode.
//!
//! `?follow=true` turns the response into a Server-Sent Events stream: each
//! line from the log source becomes one `data:` frame, and the stream ends
//! when the source channel closes or the client goes away (dropping the
//! response body cancels the stream).

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, Sse},
    },
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::{AdminState, ApiError, require, validate_domain};
use crate::auth::AuthContext;

/// Default number of lines returned when the caller does not say.
const DEFAULT_LINES: i64 = 50;
/// Hard ceiling on requested lines.
const MAX_LINES: i64 = 10_000;

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    lines: Option<i64>,
    #[serde(default)]
    follow: bool,
}

/// Clamp the `lines` parameter: non-positive silently defaults, huge values
/// are capped.
fn clamp_lines(requested: Option<i64>) -> usize {
    let lines = match requested {
        Some(n) if n > 0 => n.min(MAX_LINES),
        _ => DEFAULT_LINES,
    };
    usize::try_from(lines).unwrap_or(DEFAULT_LINES as usize)
}

/// `GET /admin/logs` — Gordon's own process logs.
pub(super) async fn process(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, ApiError> {
    require(&context, "status", "read")?;
    let lines = clamp_lines(query.lines);

    if query.follow {
        let rx = state
            .logs
            .follow_process_logs(lines)
            .await
            .map_err(|e| ApiError::from_error(e, "follow logs"))?;
        return Ok(sse_response(rx));
    }

    let logs = state
        .logs
        .process_logs(lines)
        .await
        .map_err(|e| ApiError::from_error(e, "get logs"))?;
    Ok(Json(json!({"logs": logs})).into_response())
}

/// `GET /admin/logs/{domain}` — container logs for a route.
pub(super) async fn container(
    State(state): State<Arc<AdminState>>,
    Extension(context): Extension<AuthContext>,
    Path(domain): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, ApiError> {
    require(&context, "status", "read")?;
    validate_domain(&domain)?;
    let lines = clamp_lines(query.lines);

    if query.follow {
        let rx = state
            .logs
            .follow_container_logs(&domain, lines)
            .await
            .map_err(|e| ApiError::from_error(e, "follow logs"))?;
        return Ok(sse_response(rx));
    }

    let logs = state
        .logs
        .container_logs(&domain, lines)
        .await
        .map_err(|e| ApiError::from_error(e, "get logs"))?;
    Ok(Json(json!({"domain": domain, "logs": logs})).into_response())
}

/// Wrap a line channel as an SSE response. Line order is preserved; the
/// bounded channel gives the source back-pressure when the client is slow.
fn sse_response(mut rx: mpsc::Receiver<String>) -> Response {
    let stream = stream! {
        while let Some(line) = rx.recv().await {
            yield Ok::<SseEvent, Infallible>(SseEvent::default().data(line));
        }
    };

    let mut response = Sse::new(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

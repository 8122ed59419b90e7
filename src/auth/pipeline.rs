//! Admin authentication pipeline.
//!
//! Per-request order is fixed: global rate limit, per-IP rate limit, bearer
//! token validation, admin-scope gate, context injection, then the handler,
//! and finally a best-effort sliding-expiry renewal whose result rides back
//! on the `X-Gordon-Token` response header.
//!
//! The pipeline does **not** check per-resource permissions; each handler
//! asks the scope engine for the `(resource, action)` it needs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

use super::AuthContext;
use crate::security::client_ip::TrustedProxies;
use crate::service::{AuthService, RateLimiter};

/// Response header carrying a renewed token.
pub const TOKEN_HEADER: &str = "x-gordon-token";

/// Challenge sent with every admin 401.
const CHALLENGE: &str = "Bearer realm=\"gordon-admin\"";

/// Injected pipeline state.
pub struct AuthPipeline {
    /// Token validator
    pub auth: Arc<dyn AuthService>,
    /// Global tier; `None` disables it
    pub global_limiter: Option<Arc<dyn RateLimiter>>,
    /// Per-IP tier; `None` disables it
    pub ip_limiter: Option<Arc<dyn RateLimiter>>,
    /// Trusted-proxy set for client-IP resolution
    pub trusted_proxies: Arc<TrustedProxies>,
}

/// Admin auth middleware. Wraps every `/admin` route.
pub async fn admin_auth(
    State(pipeline): State<Arc<AuthPipeline>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Rate limiting runs before any token work so floods never reach the
    // validator. Global tier first, then per-IP.
    if let Some(ref limiter) = pipeline.global_limiter {
        if !limiter.allow("global").await {
            warn!("Global rate limit exceeded");
            return rate_limited();
        }
    }

    if let Some(ref limiter) = pipeline.ip_limiter {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "0.0.0.0:0".parse().expect("literal addr"), |c| c.0);
        let client_ip = pipeline.trusted_proxies.client_ip(remote, request.headers());
        if !limiter.allow(&format!("ip:{client_ip}")).await {
            warn!(client_ip = %client_ip, "Per-IP rate limit exceeded");
            return rate_limited();
        }
    }

    // The admin surface must never be reachable without authentication.
    if !pipeline.auth.is_enabled() {
        error!("Admin request rejected: authentication is disabled");
        return unauthorized("authentication is required");
    }

    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(response) => return response,
    };

    let claims = match pipeline.auth.validate_token(token).await {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "Token validation failed");
            return unauthorized("invalid token");
        }
    };

    if !claims.has_admin_scope() {
        warn!(subject = %claims.subject, "Token has no admin scope");
        return forbidden("admin scope required");
    }

    let token = token.to_string();
    request.extensions_mut().insert(AuthContext::from_claims(claims));

    let mut response = next.run(request).await;

    // Sliding expiry: failures are silent to the caller.
    match pipeline.auth.extend_token(&token).await {
        Ok(Some(renewed)) => {
            if let Ok(value) = HeaderValue::from_str(&renewed) {
                response.headers_mut().insert(TOKEN_HEADER, value);
            }
        }
        Ok(None) => {}
        Err(e) => debug!(error = %e, "Token extension failed"),
    }

    response
}

/// Extract the bearer token, enforcing the exact scheme.
#[allow(clippy::result_large_err)]
fn bearer_token(request: &Request<Body>) -> Result<&str, Response> {
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return Err(unauthorized("missing authorization header"));
    };
    let Ok(value) = value.to_str() else {
        return Err(unauthorized("authorization header must use Bearer scheme"));
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(unauthorized("authorization header must use Bearer scheme"));
    };
    Ok(token)
}

fn rate_limited() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "1")],
        Json(json!({"error": "rate limit exceeded"})),
    )
        .into_response()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, CHALLENGE)],
        Json(json!({"error": message})),
    )
        .into_response()
}

fn forbidden(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"error": message}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_auth(value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/admin/routes");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn missing_header_is_distinct_from_wrong_scheme() {
        let err = bearer_token(&request_with_auth(None)).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = bearer_token(&request_with_auth(Some("Basic dXNlcjpwYXNz"))).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        // Lowercase scheme is not the literal `Bearer `.
        assert!(bearer_token(&request_with_auth(Some("bearer tok"))).is_err());
    }

    #[test]
    fn bearer_token_is_extracted_verbatim() {
        let token = bearer_token(&request_with_auth(Some("Bearer abc.def.ghi"))).unwrap();
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn challenge_header_is_present_on_401() {
        let response = unauthorized("invalid token");
        assert_eq!(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok()),
            Some(CHALLENGE)
        );
    }

    #[test]
    fn forbidden_has_no_challenge() {
        let response = forbidden("admin scope required");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = rate_limited();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("1")
        );
    }
}

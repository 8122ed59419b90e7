//! Authentication middleware for the Docker v2 registry surface.
//!
//! Order of checks:
//!
//! 1. Loopback bypass: a transport-loopback peer presenting the node's
//!    internal Basic credentials is allowed with no further checks. This is
//!    the only path that lets the node pull its own images without a token.
//! 2. Plaintext transport (no TLS, no `X-Forwarded-Proto: https`) logs a
//!    warning but does not reject.
//! 3. With auth disabled, requests pass through.
//! 4. Password mode tries Basic first and falls back to token-as-password,
//!    because CI tokens are commonly submitted through Basic. Token mode
//!    tries Bearer first, then Basic where the password is the JWT and the
//!    username must equal the token subject.
//! 5. Authenticated token claims are checked against the repository and
//!    action derived from the request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::InternalCredentials;
use crate::auth::AuthContext;
use crate::model::TokenClaims;
use crate::security::client_ip::is_loopback;
use crate::security::scope::{RegistryAction, has_repository_access};
use crate::service::{AuthService, AuthType};

/// Injected middleware state.
pub struct RegistryAuthState {
    /// Credential validator
    pub auth: Arc<dyn AuthService>,
    /// The node's own loopback pull credentials
    pub internal_credentials: InternalCredentials,
    /// Whether this listener terminates TLS. Drives the challenge scheme;
    /// forwarded-proto headers are never consulted for it.
    pub tls: bool,
}

/// Registry auth middleware. Wraps every `/v2` route.
pub async fn registry_auth(
    State(state): State<Arc<RegistryAuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "0.0.0.0:0".parse().expect("literal addr"), |c| c.0);

    let basic = basic_credentials(&request);

    if is_loopback(remote) {
        if let Some((ref user, ref pass)) = basic {
            if constant_time_match(&state.internal_credentials, user, pass) {
                debug!("Loopback request with internal credentials, bypassing auth");
                return next.run(request).await;
            }
        }
    }

    if !state.tls
        && request
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            != Some("https")
    {
        warn!("Registry request over plaintext transport");
    }

    if !state.auth.is_enabled() {
        return next.run(request).await;
    }

    let claims = match state.auth.auth_type() {
        AuthType::Password => match password_flow(&state, basic.as_ref()).await {
            Ok(claims) => claims,
            Err(()) => return password_challenge(),
        },
        AuthType::Token => match token_flow(&state, bearer_token(&request).as_deref(), basic.as_ref()).await {
            Ok(claims) => Some(claims),
            Err(()) => return token_challenge(&state, &request),
        },
    };

    // Password-authenticated operators get the full surface; scope
    // enforcement applies to token claims only.
    let Some(claims) = claims else {
        return next.run(request).await;
    };

    let action = action_for_method(request.method());
    if let Some(repository) = repository_from_path(request.uri().path()) {
        let context = AuthContext::from_claims(claims);
        if !has_repository_access(&context.scopes, &repository, action) {
            warn!(
                subject = %context.subject,
                repository = %repository,
                action = ?action,
                "Registry scope denied"
            );
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Forbidden: insufficient scope"})),
            )
                .into_response();
        }
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}

/// Password mode: Basic, falling back to token-as-password.
/// `Ok(None)` is a full-access password success; `Ok(Some)` carries claims.
async fn password_flow(
    state: &RegistryAuthState,
    basic: Option<&(String, String)>,
) -> Result<Option<TokenClaims>, ()> {
    let Some((user, pass)) = basic else {
        return Err(());
    };

    if state.auth.validate_password(user, pass).await {
        return Ok(None);
    }

    // CI tokens arrive through Basic with the JWT in the password slot.
    match state.auth.validate_token(pass).await {
        Ok(claims) if claims.subject == *user => Ok(Some(claims)),
        Ok(claims) => {
            warn!(subject = %claims.subject, username = %user, "Basic username does not match token subject");
            Err(())
        }
        Err(e) => {
            debug!(error = %e, "Password and token-as-password both failed");
            Err(())
        }
    }
}

/// Token mode: Bearer first, then Basic with the JWT as password.
async fn token_flow(
    state: &RegistryAuthState,
    bearer: Option<&str>,
    basic: Option<&(String, String)>,
) -> Result<TokenClaims, ()> {
    if let Some(token) = bearer {
        return state.auth.validate_token(token).await.map_err(|e| {
            debug!(error = %e, "Bearer token validation failed");
        });
    }

    let Some((user, pass)) = basic else {
        return Err(());
    };
    match state.auth.validate_token(pass).await {
        Ok(claims) if claims.subject == *user => Ok(claims),
        Ok(claims) => {
            warn!(subject = %claims.subject, username = %user, "Basic username does not match token subject");
            Err(())
        }
        Err(e) => {
            debug!(error = %e, "Token-as-password validation failed");
            Err(())
        }
    }
}

/// Parse `Authorization: Basic` credentials when present.
fn basic_credentials(request: &Request<Body>) -> Option<(String, String)> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(value).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_match(creds: &InternalCredentials, user: &str, pass: &str) -> bool {
    let user_ok: bool = user.as_bytes().ct_eq(creds.username.as_bytes()).into();
    let pass_ok: bool = pass.as_bytes().ct_eq(creds.password.as_bytes()).into();
    user_ok && pass_ok
}

/// Registry action implied by the HTTP method.
fn action_for_method(method: &Method) -> RegistryAction {
    match *method {
        Method::GET | Method::HEAD => RegistryAction::Pull,
        _ => RegistryAction::Push,
    }
}

/// Extract the repository name from a `/v2/...` path.
///
/// The repository is everything between `/v2/` and the first segment equal
/// to `manifests`, `blobs`, `tags` or `_catalog`. Paths with no such
/// delimiter (`/v2/`, `/v2/token`) carry no repository and skip the scope
/// check.
fn repository_from_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/v2/")?;
    let mut prefix: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        if matches!(segment, "manifests" | "blobs" | "tags" | "_catalog") {
            return Some(prefix.join("/"));
        }
        prefix.push(segment);
    }
    None
}

fn password_challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"Gordon Registry\""),
        )],
        Json(json!({"error": "authentication required"})),
    )
        .into_response()
}

fn token_challenge(state: &RegistryAuthState, request: &Request<Body>) -> Response {
    // Scheme comes from the transport TLS flag only. A spoofed
    // X-Forwarded-Proto here could redirect clients to a phishing realm.
    let scheme = if state.tls { "https" } else { "http" };
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map_or_else(String::new, sanitize_host);

    let challenge = format!(
        "Bearer realm=\"{scheme}://{host}/auth/token\",service=\"gordon-registry\""
    );
    let value = HeaderValue::from_str(&challenge)
        .unwrap_or_else(|_| HeaderValue::from_static("Bearer realm=\"/auth/token\""));

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, value)],
        Json(json!({"error": "authentication required"})),
    )
        .into_response()
}

/// Strip anything outside `[A-Za-z0-9.\-:\[\]]` so a hostile Host header
/// cannot inject into the challenge.
fn sanitize_host(host: &str) -> String {
    host.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
        .collect()
}

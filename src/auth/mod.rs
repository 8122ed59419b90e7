//! Admin authentication: the request pipeline and the token service.

pub mod jwt;
pub mod pipeline;

use crate::model::TokenClaims;
use crate::security::scope::Scope;

/// Validated identity attached to each authenticated admin request.
///
/// Injected into the request extensions by the auth pipeline; handlers pull
/// it out to run their per-resource permission checks.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Token subject
    pub subject: String,
    /// Parsed scopes (malformed entries already dropped)
    pub scopes: Vec<Scope>,
    /// The full validated claims
    pub claims: TokenClaims,
}

impl AuthContext {
    /// Build a context from validated claims, parsing the scope strings.
    #[must_use]
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            subject: claims.subject.clone(),
            scopes: crate::security::scope::parse_scopes(&claims.scopes),
            claims,
        }
    }
}

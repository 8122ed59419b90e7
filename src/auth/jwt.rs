//! HS256 token service.
//!
//! Tokens carry `{sub, scopes, exp}`. Renewal is sliding: every successful
//! extension re-issues the token with a fresh expiry, so an active operator
//! session never lapses mid-use while an idle token dies after one TTL.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::model::TokenClaims;
use crate::service::{AuthService, AuthType};
use crate::{Error, Result};

/// Wire form of the claims.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    scopes: Vec<String>,
}

/// `AuthService` backed by HS256 JWTs and an optional static admin password.
pub struct JwtAuthService {
    enabled: bool,
    auth_type: AuthType,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    admin_username: String,
    admin_password: Option<String>,
}

impl JwtAuthService {
    /// Create a token-mode service.
    #[must_use]
    pub fn token_mode(secret: &str, token_ttl: Duration) -> Self {
        Self {
            enabled: true,
            auth_type: AuthType::Token,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
            admin_username: String::new(),
            admin_password: None,
        }
    }

    /// Create a password-mode service. Tokens still validate, so CI tokens
    /// submitted as Basic passwords keep working.
    #[must_use]
    pub fn password_mode(
        secret: &str,
        token_ttl: Duration,
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            enabled: true,
            auth_type: AuthType::Password,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
            admin_username: username.to_string(),
            admin_password: Some(password.to_string()),
        }
    }

    /// A disabled service: every check fails closed at the pipeline.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            auth_type: AuthType::Token,
            encoding_key: EncodingKey::from_secret(&[]),
            decoding_key: DecodingKey::from_secret(&[]),
            token_ttl: Duration::ZERO,
            admin_username: String::new(),
            admin_password: None,
        }
    }

    /// Build a service from the auth section of the configuration.
    ///
    /// Without a configured secret a random one is generated, which keeps
    /// the node usable but means tokens do not survive a restart.
    #[must_use]
    pub fn from_config(config: &crate::config::AuthConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let secret = config.token_secret.clone().unwrap_or_else(|| {
            tracing::warn!(
                "No token secret configured; generated an ephemeral one, tokens will not survive restart"
            );
            use rand::distr::{Alphanumeric, SampleString};
            Alphanumeric.sample_string(&mut rand::rng(), 48)
        });
        let ttl = Duration::from_secs(config.token_ttl_secs);

        match (config.auth_type.as_str(), &config.admin_password) {
            ("password", Some(password)) => {
                Self::password_mode(&secret, ttl, &config.admin_username, password)
            }
            ("password", None) => {
                tracing::warn!("Password auth configured without a password; falling back to token mode");
                Self::token_mode(&secret, ttl)
            }
            _ => Self::token_mode(&secret, ttl),
        }
    }

    /// Issue a token for `subject` carrying `scopes`.
    pub fn issue_token(&self, subject: &str, scopes: &[String]) -> Result<String> {
        let exp = chrono::Utc::now().timestamp()
            + i64::try_from(self.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = JwtClaims {
            sub: subject.to_string(),
            exp,
            scopes: scopes.to_vec(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::Auth(e.to_string()))
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    async fn validate_password(&self, username: &str, password: &str) -> bool {
        let Some(ref expected) = self.admin_password else {
            return false;
        };
        let user_ok: bool = username
            .as_bytes()
            .ct_eq(self.admin_username.as_bytes())
            .into();
        let pass_ok: bool = password.as_bytes().ct_eq(expected.as_bytes()).into();
        user_ok && pass_ok
    }

    async fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        let data = decode::<JwtClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| Error::Auth(e.to_string()))?;

        Ok(TokenClaims {
            subject: data.claims.sub,
            scopes: data.claims.scopes,
            expires_at: data.claims.exp,
        })
    }

    async fn extend_token(&self, token: &str) -> Result<Option<String>> {
        let claims = self.validate_token(token).await?;
        let renewed = self.issue_token(&claims.subject, &claims.scopes)?;
        Ok(Some(renewed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtAuthService {
        JwtAuthService::token_mode("test-secret", Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn issued_tokens_validate() {
        let svc = service();
        let token = svc
            .issue_token("alice", &["admin:*:*".to_string()])
            .unwrap();

        let claims = svc.validate_token(&token).await.unwrap();
        assert_eq!(claims.subject, "alice");
        assert_eq!(claims.scopes, vec!["admin:*:*".to_string()]);
        assert!(claims.expires_at > chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let svc = service();
        let other = JwtAuthService::token_mode("other-secret", Duration::from_secs(3600));
        let token = other.issue_token("alice", &[]).unwrap();

        assert!(svc.validate_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        assert!(service().validate_token("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn extend_reissues_with_fresh_expiry() {
        let short = JwtAuthService::token_mode("test-secret", Duration::from_secs(10));
        let token = short.issue_token("alice", &["admin:routes:read".to_string()]).unwrap();
        let original = short.validate_token(&token).await.unwrap();

        let long = JwtAuthService::token_mode("test-secret", Duration::from_secs(7200));
        let renewed = long.extend_token(&token).await.unwrap().unwrap();
        let renewed_claims = long.validate_token(&renewed).await.unwrap();

        assert_eq!(renewed_claims.subject, "alice");
        assert_eq!(renewed_claims.scopes, original.scopes);
        assert!(renewed_claims.expires_at > original.expires_at);
    }

    #[tokio::test]
    async fn password_mode_checks_both_fields() {
        let svc = JwtAuthService::password_mode(
            "secret",
            Duration::from_secs(3600),
            "admin",
            "hunter2",
        );

        assert!(svc.validate_password("admin", "hunter2").await);
        assert!(!svc.validate_password("admin", "wrong").await);
        assert!(!svc.validate_password("other", "hunter2").await);
    }

    #[tokio::test]
    async fn token_mode_has_no_password() {
        assert!(!service().validate_password("admin", "anything").await);
    }
}

//! Shared test fixtures: in-memory collaborators and a router builder that
//! mirrors the server assembly.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{Router, middleware};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tower_http::catch_panic::CatchPanicLayer;

use gordon::admin::{self, AdminState};
use gordon::auth::pipeline::{AuthPipeline, admin_auth};
use gordon::config::{Config, ConfigStore};
use gordon::events::Event;
use gordon::health::HealthEngine;
use gordon::model::{
    Attachment, ContainerView, NetworkView, Route, RouteDetails, TokenClaims,
};
use gordon::security::client_ip::TrustedProxies;
use gordon::service::{
    AuthService, AuthType, ContainerService, EventPublisher, HttpProber, LogService, RateLimiter,
};
use gordon::store::MemorySecretStore;
use gordon::{Error, Result};

// ── Auth ──────────────────────────────────────────────────────────────────

/// Token validator over a fixed token table.
pub struct MockAuth {
    pub enabled: bool,
    pub auth_type: AuthType,
    pub tokens: HashMap<String, TokenClaims>,
    pub passwords: HashMap<String, String>,
    pub extend_result: Option<String>,
    pub validate_calls: AtomicUsize,
}

impl MockAuth {
    pub fn new() -> Self {
        Self {
            enabled: true,
            auth_type: AuthType::Token,
            tokens: HashMap::new(),
            passwords: HashMap::new(),
            extend_result: Some("renewed-token".to_string()),
            validate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_token(mut self, token: &str, subject: &str, scopes: &[&str]) -> Self {
        self.tokens.insert(
            token.to_string(),
            TokenClaims {
                subject: subject.to_string(),
                scopes: scopes.iter().map(ToString::to_string).collect(),
                expires_at: i64::MAX,
            },
        );
        self
    }

    pub fn with_password(mut self, username: &str, password: &str) -> Self {
        self.auth_type = AuthType::Password;
        self.passwords
            .insert(username.to_string(), password.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[async_trait]
impl AuthService for MockAuth {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    async fn validate_password(&self, username: &str, password: &str) -> bool {
        self.passwords.get(username).is_some_and(|p| p == password)
    }

    async fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Auth("unknown token".to_string()))
    }

    async fn extend_token(&self, _token: &str) -> Result<Option<String>> {
        Ok(self.extend_result.clone())
    }
}

// ── Containers ────────────────────────────────────────────────────────────

/// Container runtime projection over a fixed container table.
pub struct MockContainers {
    pub containers: Mutex<HashMap<String, ContainerView>>,
    pub attachments: Mutex<HashMap<String, Vec<Attachment>>>,
    pub networks: Mutex<Vec<NetworkView>>,
    pub deploys: Mutex<Vec<String>>,
    pub fail_networks: AtomicBool,
    pub deploy_manifest_missing: AtomicBool,
    pub network_calls: AtomicUsize,
}

impl MockContainers {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
            attachments: Mutex::new(HashMap::new()),
            networks: Mutex::new(Vec::new()),
            deploys: Mutex::new(Vec::new()),
            fail_networks: AtomicBool::new(false),
            deploy_manifest_missing: AtomicBool::new(false),
            network_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert_container(&self, domain: &str, status: &str) {
        self.containers.lock().insert(
            domain.to_string(),
            ContainerView {
                id: format!("id-{domain}"),
                name: domain.to_string(),
                image: "app:latest".to_string(),
                status: status.to_string(),
                network: "gordon-net".to_string(),
            },
        );
    }
}

#[async_trait]
impl ContainerService for MockContainers {
    async fn get(&self, domain: &str) -> Result<Option<ContainerView>> {
        Ok(self.containers.lock().get(domain).cloned())
    }

    async fn list_routes_with_details(&self) -> Result<Vec<RouteDetails>> {
        Ok(Vec::new())
    }

    async fn list_attachments(&self, domain: &str) -> Result<Vec<Attachment>> {
        Ok(self
            .attachments
            .lock()
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkView>> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_networks.load(Ordering::SeqCst) {
            return Err(Error::Internal(
                "connection refused to 10.0.0.5:2375".to_string(),
            ));
        }
        Ok(self.networks.lock().clone())
    }

    async fn deploy(&self, route: &Route) -> Result<()> {
        if self.deploy_manifest_missing.load(Ordering::SeqCst) {
            return Err(Error::ManifestNotFound(route.image.clone()));
        }
        self.deploys.lock().push(route.domain.clone());
        Ok(())
    }

    async fn restart(&self, _domain: &str, _with_attachments: bool) -> Result<()> {
        Ok(())
    }
}

// ── Logs ──────────────────────────────────────────────────────────────────

/// Log source replaying a fixed line list; follow mode sends the lines and
/// closes the channel.
pub struct MockLogs {
    pub lines: Vec<String>,
}

impl MockLogs {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl LogService for MockLogs {
    async fn process_logs(&self, lines: usize) -> Result<Vec<String>> {
        Ok(self.lines.iter().rev().take(lines).rev().cloned().collect())
    }

    async fn follow_process_logs(&self, lines: usize) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(8);
        let backlog: Vec<String> = self.lines.iter().rev().take(lines).rev().cloned().collect();
        tokio::spawn(async move {
            for line in backlog {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            // Dropping the sender closes the stream.
        });
        Ok(rx)
    }

    async fn container_logs(&self, _domain: &str, lines: usize) -> Result<Vec<String>> {
        self.process_logs(lines).await
    }

    async fn follow_container_logs(
        &self,
        _domain: &str,
        lines: usize,
    ) -> Result<mpsc::Receiver<String>> {
        self.follow_process_logs(lines).await
    }
}

// ── Events / limits / probes ──────────────────────────────────────────────

/// Publisher that records every event.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<Event>>,
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: Event) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Limiter with a switchable verdict and a call counter.
pub struct CountingLimiter {
    pub allow: AtomicBool,
    pub calls: AtomicUsize,
}

impl CountingLimiter {
    pub fn allowing() -> Self {
        Self {
            allow: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn allow(&self, _key: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.allow.load(Ordering::SeqCst)
    }
}

/// Prober that always succeeds with 200.
pub struct StaticProber;

#[async_trait]
impl HttpProber for StaticProber {
    async fn probe(&self, _url: &str) -> Result<(u16, u64)> {
        Ok((200, 3))
    }
}

// ── Harness ───────────────────────────────────────────────────────────────

/// All collaborators plus the assembled admin app.
pub struct TestHarness {
    pub config: Arc<ConfigStore>,
    pub auth: Arc<MockAuth>,
    pub containers: Arc<MockContainers>,
    pub secrets: Arc<MemorySecretStore>,
    pub logs: Arc<MockLogs>,
    pub events: Arc<RecordingPublisher>,
    pub global_limiter: Arc<CountingLimiter>,
    pub ip_limiter: Arc<CountingLimiter>,
}

impl TestHarness {
    pub fn new(auth: MockAuth) -> Self {
        Self {
            config: Arc::new(ConfigStore::new(Config::default(), None)),
            auth: Arc::new(auth),
            containers: Arc::new(MockContainers::new()),
            secrets: Arc::new(MemorySecretStore::new()),
            logs: Arc::new(MockLogs::new(&[])),
            events: Arc::new(RecordingPublisher::default()),
            global_limiter: Arc::new(CountingLimiter::allowing()),
            ip_limiter: Arc::new(CountingLimiter::allowing()),
        }
    }

    pub fn with_logs(mut self, lines: &[&str]) -> Self {
        self.logs = Arc::new(MockLogs::new(lines));
        self
    }

    /// Assemble the app the way the server does: admin router, auth
    /// pipeline, panic recovery and security headers.
    pub fn app(&self) -> Router {
        let pipeline = Arc::new(AuthPipeline {
            auth: Arc::clone(&self.auth) as _,
            global_limiter: Some(Arc::clone(&self.global_limiter) as _),
            ip_limiter: Some(Arc::clone(&self.ip_limiter) as _),
            trusted_proxies: Arc::new(TrustedProxies::default()),
        });

        let health = Arc::new(HealthEngine::new(
            Arc::clone(&self.config) as _,
            Arc::clone(&self.containers) as _,
            Arc::new(StaticProber) as _,
        ));

        let state = Arc::new(AdminState {
            config: Arc::clone(&self.config) as _,
            containers: Arc::clone(&self.containers) as _,
            secrets: Arc::clone(&self.secrets) as _,
            logs: Arc::clone(&self.logs) as _,
            health,
            events: Some(Arc::clone(&self.events) as _),
            registry: None,
            backups: None,
        });

        let admin_router =
            admin::router(state).layer(middleware::from_fn_with_state(pipeline, admin_auth));

        Router::new()
            .nest("/admin", admin_router)
            .layer(middleware::from_fn(gordon::security::security_headers))
            .layer(CatchPanicLayer::new())
    }
}

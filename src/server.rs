//! Server assembly.
//!
//! Builds the admin and registry routers, applies the middleware stack in
//! its fixed order (request trace outermost, then panic recovery, security
//! headers, and the auth pipeline innermost on the admin subtree), and runs
//! the listener with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::admin::{self, AdminState};
use crate::auth::pipeline::{AuthPipeline, admin_auth};
use crate::config::Config;
use crate::health::HealthEngine;
use crate::limits::QuotaLimiter;
use crate::registry::{self, InternalCredentials, auth::RegistryAuthState};
use crate::security::{client_ip::TrustedProxies, security_headers};
use crate::service::{
    AuthService, BackupService, ConfigService, ContainerService, EventPublisher, HttpProber,
    LogService, RateLimiter, RegistryService, SecretService,
};
use crate::{Error, Result};

/// Collaborators injected into the control plane.
pub struct Services {
    /// Route set and server settings
    pub config: Arc<dyn ConfigService>,
    /// Credential validator
    pub auth: Arc<dyn AuthService>,
    /// Container runtime projection
    pub containers: Arc<dyn ContainerService>,
    /// Per-route secrets
    pub secrets: Arc<dyn SecretService>,
    /// Process and container logs
    pub logs: Arc<dyn LogService>,
    /// Health probe client
    pub prober: Arc<dyn HttpProber>,
    /// Event bus (optional)
    pub events: Option<Arc<dyn EventPublisher>>,
    /// Embedded registry introspection (optional)
    pub registry: Option<Arc<dyn RegistryService>>,
    /// Backup execution (optional)
    pub backups: Option<Arc<dyn BackupService>>,
}

/// The Gordon server.
pub struct Server {
    config: Config,
    services: Services,
    internal_credentials: InternalCredentials,
}

impl Server {
    /// Create a server. Internal registry credentials are generated here,
    /// once per instance.
    #[must_use]
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            config,
            services,
            internal_credentials: InternalCredentials::generate(),
        }
    }

    /// Build the full application router.
    pub fn router(&self) -> Result<Router> {
        let trusted_proxies = Arc::new(TrustedProxies::parse(
            &self.config.server.trusted_proxies,
        )?);

        let (global_limiter, ip_limiter) = if self.config.limits.enabled {
            let limits = &self.config.limits;
            (
                Some(Arc::new(QuotaLimiter::new(
                    limits.global_per_second,
                    limits.global_burst,
                )) as Arc<dyn RateLimiter>),
                Some(Arc::new(QuotaLimiter::new(
                    limits.per_ip_per_second,
                    limits.per_ip_burst,
                )) as Arc<dyn RateLimiter>),
            )
        } else {
            (None, None)
        };

        let pipeline = Arc::new(AuthPipeline {
            auth: Arc::clone(&self.services.auth),
            global_limiter,
            ip_limiter,
            trusted_proxies,
        });

        let health = Arc::new(HealthEngine::new(
            Arc::clone(&self.services.config),
            Arc::clone(&self.services.containers),
            Arc::clone(&self.services.prober),
        ));

        let admin_state = Arc::new(AdminState {
            config: Arc::clone(&self.services.config),
            containers: Arc::clone(&self.services.containers),
            secrets: Arc::clone(&self.services.secrets),
            logs: Arc::clone(&self.services.logs),
            health,
            events: self.services.events.clone(),
            registry: self.services.registry.clone(),
            backups: self.services.backups.clone(),
        });

        let registry_state = Arc::new(RegistryAuthState {
            auth: Arc::clone(&self.services.auth),
            internal_credentials: self.internal_credentials.clone(),
            tls: self.config.server.tls,
        });

        let admin_router = admin::router(admin_state)
            .layer(middleware::from_fn_with_state(pipeline, admin_auth));

        // Registry routes are merged, not nested, so the auth middleware
        // sees full `/v2/...` paths when extracting repository names.
        let app = Router::new()
            .nest("/admin", admin_router)
            .merge(registry::router(registry_state))
            .layer(middleware::from_fn(security_headers))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http());

        Ok(app)
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = self.router()?;
        let listener = TcpListener::bind(addr).await?;

        info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            "Gordon listening"
        );
        if !self.services.auth.is_enabled() {
            warn!("Authentication is disabled - admin requests will be rejected");
        }

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Panic recovery: a fixed body, the stack goes to the log only.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");

    let body = Json(json!({"error": "Internal Server Error"}));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

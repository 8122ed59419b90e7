//! Collaborator contracts consumed by the control plane.
//!
//! Gordon's core owns no storage and talks to no runtime directly: every
//! long-lived concern (route persistence, the container daemon, token
//! storage, log files, image blobs, backups) sits behind one of these traits
//! and is injected at startup. Handlers hold `Arc<dyn …>` and never depend
//! on concrete implementations.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::events::Event;
use crate::model::{
    Attachment, BackupInfo, ContainerView, ImageSummary, NetworkView, Route, RouteDetails,
    TokenClaims,
};

/// Route set and server settings.
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// All configured routes.
    async fn routes(&self) -> Result<Vec<Route>>;

    /// One route by domain; `Error::RouteNotFound` when absent.
    async fn route(&self, domain: &str) -> Result<Route>;

    /// Add a route. Duplicate domains are a conflict surfaced as an error.
    async fn add_route(&self, route: Route) -> Result<()>;

    /// Replace an existing route; `Error::RouteNotFound` when absent.
    async fn update_route(&self, route: Route) -> Result<()>;

    /// Remove a route; `Error::RouteNotFound` when absent.
    async fn remove_route(&self, domain: &str) -> Result<()>;

    /// Replace in-memory state from the backing file.
    async fn load(&self) -> Result<()>;

    /// Domain the embedded registry is served on.
    fn registry_domain(&self) -> String;
    /// Port the embedded registry listens on.
    fn registry_port(&self) -> u16;
    /// Port the main server listens on.
    fn server_port(&self) -> u16;
    /// Data directory for runtime state.
    fn data_dir(&self) -> PathBuf;
    /// Prefix for per-route container networks.
    fn network_prefix(&self) -> String;
    /// Whether pushes to the registry auto-create routes.
    fn auto_route_enabled(&self) -> bool;
    /// Whether per-route network isolation is enabled.
    fn network_isolation_enabled(&self) -> bool;
    /// Routes proxied to external upstreams rather than local containers.
    fn external_routes(&self) -> Vec<Route>;
}

/// How admin and registry clients authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// HTTP Basic with a static password
    Password,
    /// Bearer tokens with claims
    Token,
}

/// Token and password validation.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Whether authentication is enabled at all.
    fn is_enabled(&self) -> bool;

    /// Configured authentication mode.
    fn auth_type(&self) -> AuthType;

    /// Check a username/password pair.
    async fn validate_password(&self, username: &str, password: &str) -> bool;

    /// Validate a bearer token and return its claims.
    async fn validate_token(&self, token: &str) -> Result<TokenClaims>;

    /// Best-effort sliding-expiry renewal. `Ok(None)` means the service
    /// declined to renew; callers treat any failure as non-fatal.
    async fn extend_token(&self, token: &str) -> Result<Option<String>>;
}

/// Read-only and lifecycle operations against the container runtime.
#[async_trait]
pub trait ContainerService: Send + Sync {
    /// Container backing a route, when one exists.
    async fn get(&self, domain: &str) -> Result<Option<ContainerView>>;

    /// All routes joined with their containers and attachments.
    async fn list_routes_with_details(&self) -> Result<Vec<RouteDetails>>;

    /// Attachments owned by a route.
    async fn list_attachments(&self, domain: &str) -> Result<Vec<Attachment>>;

    /// All container networks.
    async fn list_networks(&self) -> Result<Vec<NetworkView>>;

    /// Deploy (pull + recreate) the container for a route.
    async fn deploy(&self, route: &Route) -> Result<()>;

    /// Restart the container for a route, optionally with its attachments.
    async fn restart(&self, domain: &str, with_attachments: bool) -> Result<()>;
}

/// Per-route secret storage. Values never leave the service except into
/// container environments; the admin surface only ever lists keys.
#[async_trait]
pub trait SecretService: Send + Sync {
    /// Keys (never values) stored for a domain.
    async fn list_keys(&self, domain: &str) -> Result<Vec<String>>;

    /// Merge a key/value map into a domain's secrets.
    async fn set(&self, domain: &str, secrets: HashMap<String, String>) -> Result<()>;

    /// Remove one key from a domain's secrets.
    async fn delete(&self, domain: &str, key: &str) -> Result<()>;

    /// Keys stored for one of a route's attachments.
    async fn list_attachment_keys(&self, domain: &str, attachment: &str) -> Result<Vec<String>>;

    /// Merge a key/value map into an attachment's secrets.
    async fn set_attachment(
        &self,
        domain: &str,
        attachment: &str,
        secrets: HashMap<String, String>,
    ) -> Result<()>;

    /// Remove one key from an attachment's secrets.
    async fn delete_attachment(&self, domain: &str, attachment: &str, key: &str) -> Result<()>;
}

/// Process and container log access.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Last `lines` lines of Gordon's own process log.
    async fn process_logs(&self, lines: usize) -> Result<Vec<String>>;

    /// Follow the process log. The channel closing ends the stream.
    async fn follow_process_logs(&self, lines: usize) -> Result<mpsc::Receiver<String>>;

    /// Last `lines` lines of a route's container log.
    async fn container_logs(&self, domain: &str, lines: usize) -> Result<Vec<String>>;

    /// Follow a route's container log. The channel closing ends the stream.
    async fn follow_container_logs(&self, domain: &str, lines: usize)
    -> Result<mpsc::Receiver<String>>;
}

/// Embedded image registry introspection (optional collaborator).
#[async_trait]
pub trait RegistryService: Send + Sync {
    /// Repositories with their tags.
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    /// Delete one tag or digest from a repository.
    async fn delete_image(&self, name: &str, reference: &str) -> Result<()>;
}

/// Backup creation and listing (optional collaborator).
#[async_trait]
pub trait BackupService: Send + Sync {
    /// Create a backup of routes, secrets and registry data.
    async fn create_backup(&self) -> Result<BackupInfo>;

    /// Previously created backups, newest first.
    async fn list_backups(&self) -> Result<Vec<BackupInfo>>;
}

/// Event bus seam. Publishing never blocks; delivery is best-effort.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> Result<()>;
}

/// Token-bucket abstraction. Keys are opaque: the caller composes
/// `"global"` and `"ip:<canonical-ip>"` tiers.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `true` when the request under `key` is within budget.
    async fn allow(&self, key: &str) -> bool;
}

/// HTTP probe used by the health engine.
#[async_trait]
pub trait HttpProber: Send + Sync {
    /// GET `url`, returning `(status, elapsed_ms)`.
    async fn probe(&self, url: &str) -> Result<(u16, u64)>;
}

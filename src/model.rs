//! Shared types: routes, containers, claims, health snapshots.
//!
//! Long-lived entities (routes, secrets, tokens, containers) live in the
//! collaborator services; everything here is a request-scoped value or a
//! read-only projection.

use serde::{Deserialize, Serialize};

/// A route binds an external hostname to a container image.
///
/// `domain` is the unique key across all APIs: a case-insensitive host with
/// no scheme and no port. `image` is an OCI reference with an optional tag or
/// `@digest`; the implicit tag is `latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// External hostname (unique key)
    #[serde(default)]
    pub domain: String,
    /// OCI image reference
    #[serde(default)]
    pub image: String,
    /// Whether the route is served over HTTPS
    #[serde(default)]
    pub https: bool,
}

impl Route {
    /// Validate the invariant fields.
    pub fn validate(&self) -> crate::Result<()> {
        if self.domain.trim().is_empty() {
            return Err(crate::Error::RouteDomainEmpty);
        }
        if self.image.trim().is_empty() {
            return Err(crate::Error::RouteImageEmpty);
        }
        Ok(())
    }
}

/// Sidecar container bound to a route.
///
/// Attachments are owned by their route: removing the route removes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment name
    pub name: String,
    /// OCI image reference
    pub image: String,
    /// Runtime container id
    pub container_id: String,
    /// Opaque runtime status string
    pub status: String,
    /// Network the attachment is connected to
    pub network: String,
}

/// Read-only projection of a container from the runtime.
///
/// `status` is an opaque string; the only value treated specially is
/// `"running"`, which gates HTTP health probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerView {
    /// Runtime container id
    pub id: String,
    /// Container name
    pub name: String,
    /// OCI image reference
    pub image: String,
    /// Opaque runtime status string
    pub status: String,
    /// Network the container is connected to
    pub network: String,
}

/// Read-only projection of a container network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkView {
    /// Network id
    pub id: String,
    /// Network name
    pub name: String,
    /// Driver (bridge, overlay, ...)
    pub driver: String,
    /// Names of containers connected to this network
    pub containers: Vec<String>,
}

/// Health probe result for one route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHealth {
    /// Route domain
    pub domain: String,
    /// Container status at probe time (`"not found"` when absent)
    pub container_status: String,
    /// HTTP status from the probe, when one was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Probe round-trip time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// `true` iff the probe returned a status in [200, 400)
    pub healthy: bool,
    /// Probe error, when the HTTP request itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteHealth {
    /// A route whose container could not be probed.
    #[must_use]
    pub fn unprobed(domain: &str, container_status: &str) -> Self {
        Self {
            domain: domain.to_string(),
            container_status: container_status.to_string(),
            http_status: None,
            response_time_ms: None,
            healthy: false,
            error: None,
        }
    }
}

/// Parsed, validated contents of a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token subject (user or CI identity)
    pub subject: String,
    /// Raw scope strings; parsed on demand by the scope engine
    pub scopes: Vec<String>,
    /// Expiry as seconds since the Unix epoch
    pub expires_at: i64,
}

impl TokenClaims {
    /// `true` when at least one scope is an admin scope.
    #[must_use]
    pub fn has_admin_scope(&self) -> bool {
        self.scopes.iter().any(|s| s.starts_with("admin:"))
    }
}

/// A route joined with its container and attachments, for the detailed
/// route listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDetails {
    /// The route
    #[serde(flatten)]
    pub route: Route,
    /// Container backing the route, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerView>,
    /// Sidecar containers bound to the route
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A route with its container status, for the aggregate status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStatus {
    /// Route domain
    pub domain: String,
    /// OCI image reference
    pub image: String,
    /// Whether the route is served over HTTPS
    pub https: bool,
    /// Container status (`"not found"` when no container exists)
    pub container_status: String,
    /// Runtime container id, when a container exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// Image stored in the embedded registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    /// Repository name
    pub name: String,
    /// Tags present for the repository
    pub tags: Vec<String>,
    /// Total size in bytes
    pub size_bytes: u64,
}

/// A completed backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Backup identifier
    pub id: String,
    /// Creation time (RFC 3339)
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Archive size in bytes
    pub size_bytes: u64,
}

//! Configuration management.
//!
//! `Config` is the serde view of the YAML file (plus `GORDON_*` env
//! overrides); `ConfigStore` wraps it behind a lock and implements the
//! [`ConfigService`] collaborator, including the reload-from-file seam used
//! by `POST /admin/reload`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Route;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Rate-limit configuration
    pub limits: LimitsConfig,
    /// Routes served by local containers
    pub routes: Vec<Route>,
    /// Routes proxied to external upstreams
    pub external_routes: Vec<Route>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port for the main server
    pub port: u16,
    /// Domain the embedded registry is served on
    pub registry_domain: String,
    /// Port the embedded registry listens on
    pub registry_port: u16,
    /// Data directory for runtime state
    pub data_dir: PathBuf,
    /// Prefix for per-route container networks
    pub network_prefix: String,
    /// Whether registry pushes auto-create routes
    pub auto_route: bool,
    /// Whether per-route network isolation is enabled
    pub network_isolation: bool,
    /// Trusted reverse proxies (CIDR ranges or bare addresses)
    pub trusted_proxies: Vec<String>,
    /// Whether this listener terminates TLS
    pub tls: bool,
    /// Health-probe timeout in seconds
    pub probe_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            registry_domain: "registry.localhost".to_string(),
            registry_port: 5000,
            data_dir: PathBuf::from("/var/lib/gordon"),
            network_prefix: "gordon".to_string(),
            auto_route: true,
            network_isolation: false,
            trusted_proxies: Vec::new(),
            tls: false,
            probe_timeout_secs: 10,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable authentication. The admin surface fails closed when disabled.
    pub enabled: bool,
    /// `token` or `password`
    pub auth_type: String,
    /// HS256 secret for token signing
    pub token_secret: Option<String>,
    /// Token time-to-live in seconds
    pub token_ttl_secs: u64,
    /// Admin username (password mode)
    pub admin_username: String,
    /// Admin password (password mode)
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_type: "token".to_string(),
            token_secret: None,
            token_ttl_secs: 3600,
            admin_username: "admin".to_string(),
            admin_password: None,
        }
    }
}

/// Rate-limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Enable request rate limiting
    pub enabled: bool,
    /// Global sustained requests per second
    pub global_per_second: u32,
    /// Global burst size
    pub global_burst: u32,
    /// Per-client sustained requests per second
    pub per_ip_per_second: u32,
    /// Per-client burst size
    pub per_ip_burst: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_per_second: 100,
            global_burst: 200,
            per_ip_per_second: 10,
            per_ip_burst: 20,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file with `GORDON_*`
    /// environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("GORDON_").split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

/// File-backed [`ConfigService`]. Reads swap whole snapshots; `load`
/// replaces in-memory state from the backing file.
pub struct ConfigStore {
    path: Option<PathBuf>,
    state: RwLock<Config>,
}

impl ConfigStore {
    /// Wrap a loaded config. `path` enables reload-from-file.
    #[must_use]
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: RwLock::new(config),
        }
    }

    /// Clone the current configuration snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Config {
        self.state.read().clone()
    }
}

#[async_trait]
impl crate::service::ConfigService for ConfigStore {
    async fn routes(&self) -> Result<Vec<Route>> {
        Ok(self.state.read().routes.clone())
    }

    async fn route(&self, domain: &str) -> Result<Route> {
        self.state
            .read()
            .routes
            .iter()
            .find(|r| r.domain.eq_ignore_ascii_case(domain))
            .cloned()
            .ok_or_else(|| Error::RouteNotFound(domain.to_string()))
    }

    async fn add_route(&self, route: Route) -> Result<()> {
        route.validate()?;
        let mut state = self.state.write();
        if state
            .routes
            .iter()
            .any(|r| r.domain.eq_ignore_ascii_case(&route.domain))
        {
            return Err(Error::Internal(format!(
                "route already exists: {}",
                route.domain
            )));
        }
        state.routes.push(Route {
            domain: route.domain.to_ascii_lowercase(),
            ..route
        });
        Ok(())
    }

    async fn update_route(&self, route: Route) -> Result<()> {
        route.validate()?;
        let mut state = self.state.write();
        let existing = state
            .routes
            .iter_mut()
            .find(|r| r.domain.eq_ignore_ascii_case(&route.domain))
            .ok_or_else(|| Error::RouteNotFound(route.domain.clone()))?;
        *existing = Route {
            domain: route.domain.to_ascii_lowercase(),
            ..route
        };
        Ok(())
    }

    async fn remove_route(&self, domain: &str) -> Result<()> {
        let mut state = self.state.write();
        let before = state.routes.len();
        state
            .routes
            .retain(|r| !r.domain.eq_ignore_ascii_case(domain));
        if state.routes.len() == before {
            return Err(Error::RouteNotFound(domain.to_string()));
        }
        Ok(())
    }

    async fn load(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            // No backing file; nothing to re-read.
            return Ok(());
        };
        let fresh = Config::load(Some(path))?;
        *self.state.write() = fresh;
        info!(path = %path.display(), "Configuration reloaded from file");
        Ok(())
    }

    fn registry_domain(&self) -> String {
        self.state.read().server.registry_domain.clone()
    }

    fn registry_port(&self) -> u16 {
        self.state.read().server.registry_port
    }

    fn server_port(&self) -> u16 {
        self.state.read().server.port
    }

    fn data_dir(&self) -> PathBuf {
        self.state.read().server.data_dir.clone()
    }

    fn network_prefix(&self) -> String {
        self.state.read().server.network_prefix.clone()
    }

    fn auto_route_enabled(&self) -> bool {
        self.state.read().server.auto_route
    }

    fn network_isolation_enabled(&self) -> bool {
        self.state.read().server.network_isolation
    }

    fn external_routes(&self) -> Vec<Route> {
        self.state.read().external_routes.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::service::ConfigService;

    fn route(domain: &str, image: &str) -> Route {
        Route {
            domain: domain.to_string(),
            image: image.to_string(),
            https: false,
        }
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.auth.enabled);
        assert!(config.limits.enabled);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "server:\n  port: 9999\nroutes:\n  - domain: app.example.com\n    image: app:v1"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].domain, "app.example.com");
    }

    #[tokio::test]
    async fn add_update_remove_roundtrip() {
        let store = ConfigStore::new(Config::default(), None);

        store.add_route(route("App.Example.Com", "app:v1")).await.unwrap();
        // Domains are case-insensitive and stored lowercased.
        let got = store.route("app.example.com").await.unwrap();
        assert_eq!(got.image, "app:v1");

        // Duplicate domains are a conflict, not an upsert.
        assert!(store.add_route(route("app.example.com", "app:v2")).await.is_err());

        store
            .update_route(route("app.example.com", "app:v2"))
            .await
            .unwrap();
        assert_eq!(store.route("app.example.com").await.unwrap().image, "app:v2");

        store.remove_route("app.example.com").await.unwrap();
        assert!(matches!(
            store.route("app.example.com").await,
            Err(Error::RouteNotFound(_))
        ));
        assert!(matches!(
            store.remove_route("app.example.com").await,
            Err(Error::RouteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_missing_route_is_not_found() {
        let store = ConfigStore::new(Config::default(), None);
        assert!(matches!(
            store.update_route(route("ghost.example.com", "x:1")).await,
            Err(Error::RouteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_replaces_state_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "routes:\n  - domain: a.example.com\n    image: a:1").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        let store = ConfigStore::new(config, Some(file.path().to_path_buf()));
        store.add_route(route("b.example.com", "b:1")).await.unwrap();
        assert_eq!(store.routes().await.unwrap().len(), 2);

        // Reload drops anything not in the file.
        store.load().await.unwrap();
        let routes = store.routes().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].domain, "a.example.com");
    }
}

//! In-process collaborator implementations used by the default binary
//! wiring.
//!
//! The container daemon adapter and the log tailer ship outside this crate;
//! until one is injected the control plane surfaces their resources as 503.
//! Secrets get a real in-memory store so the admin surface is usable on a
//! fresh node.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::model::{Attachment, ContainerView, NetworkView, Route, RouteDetails};
use crate::service::{ContainerService, LogService, SecretService};
use crate::{Error, Result};

/// In-memory secret store keyed by route domain.
#[derive(Default)]
pub struct MemorySecretStore {
    state: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemorySecretStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretService for MemorySecretStore {
    async fn list_keys(&self, domain: &str) -> Result<Vec<String>> {
        let state = self.state.read();
        let mut keys: Vec<String> = state
            .get(domain)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn set(&self, domain: &str, secrets: HashMap<String, String>) -> Result<()> {
        self.state
            .write()
            .entry(domain.to_string())
            .or_default()
            .extend(secrets);
        Ok(())
    }

    async fn delete(&self, domain: &str, key: &str) -> Result<()> {
        self.state
            .write()
            .get_mut(domain)
            .and_then(|m| m.remove(key));
        Ok(())
    }

    async fn list_attachment_keys(&self, domain: &str, attachment: &str) -> Result<Vec<String>> {
        self.list_keys(&attachment_slot(domain, attachment)).await
    }

    async fn set_attachment(
        &self,
        domain: &str,
        attachment: &str,
        secrets: HashMap<String, String>,
    ) -> Result<()> {
        self.set(&attachment_slot(domain, attachment), secrets).await
    }

    async fn delete_attachment(&self, domain: &str, attachment: &str, key: &str) -> Result<()> {
        self.delete(&attachment_slot(domain, attachment), key).await
    }
}

/// Attachment secrets live in their own slot beside the route's.
fn attachment_slot(domain: &str, attachment: &str) -> String {
    format!("{domain}#{attachment}")
}

/// Placeholder runtime: every operation reports the container runtime as
/// unavailable, which the admin surface maps to 503.
pub struct UnwiredRuntime;

#[async_trait]
impl ContainerService for UnwiredRuntime {
    async fn get(&self, _domain: &str) -> Result<Option<ContainerView>> {
        Err(Error::ServiceUnavailable("container runtime"))
    }

    async fn list_routes_with_details(&self) -> Result<Vec<RouteDetails>> {
        Err(Error::ServiceUnavailable("container runtime"))
    }

    async fn list_attachments(&self, _domain: &str) -> Result<Vec<Attachment>> {
        Err(Error::ServiceUnavailable("container runtime"))
    }

    async fn list_networks(&self) -> Result<Vec<NetworkView>> {
        Err(Error::ServiceUnavailable("container runtime"))
    }

    async fn deploy(&self, _route: &Route) -> Result<()> {
        Err(Error::ServiceUnavailable("container runtime"))
    }

    async fn restart(&self, _domain: &str, _with_attachments: bool) -> Result<()> {
        Err(Error::ServiceUnavailable("container runtime"))
    }
}

/// Placeholder log source mirroring [`UnwiredRuntime`].
pub struct UnwiredLogs;

#[async_trait]
impl LogService for UnwiredLogs {
    async fn process_logs(&self, _lines: usize) -> Result<Vec<String>> {
        Err(Error::ServiceUnavailable("log service"))
    }

    async fn follow_process_logs(&self, _lines: usize) -> Result<mpsc::Receiver<String>> {
        Err(Error::ServiceUnavailable("log service"))
    }

    async fn container_logs(&self, _domain: &str, _lines: usize) -> Result<Vec<String>> {
        Err(Error::ServiceUnavailable("log service"))
    }

    async fn follow_container_logs(
        &self,
        _domain: &str,
        _lines: usize,
    ) -> Result<mpsc::Receiver<String>> {
        Err(Error::ServiceUnavailable("log service"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn secrets_merge_and_delete() {
        let store = MemorySecretStore::new();

        store
            .set(
                "app.example.com",
                HashMap::from([
                    ("DB_URL".to_string(), "postgres://db".to_string()),
                    ("API_KEY".to_string(), "k1".to_string()),
                ]),
            )
            .await
            .unwrap();
        store
            .set(
                "app.example.com",
                HashMap::from([("API_KEY".to_string(), "k2".to_string())]),
            )
            .await
            .unwrap();

        let keys = store.list_keys("app.example.com").await.unwrap();
        assert_eq!(keys, vec!["API_KEY".to_string(), "DB_URL".to_string()]);

        store.delete("app.example.com", "DB_URL").await.unwrap();
        let keys = store.list_keys("app.example.com").await.unwrap();
        assert_eq!(keys, vec!["API_KEY".to_string()]);
    }

    #[tokio::test]
    async fn attachment_secrets_are_separate_from_the_route() {
        let store = MemorySecretStore::new();

        store
            .set(
                "app.example.com",
                HashMap::from([("ROUTE_KEY".to_string(), "r".to_string())]),
            )
            .await
            .unwrap();
        store
            .set_attachment(
                "app.example.com",
                "worker",
                HashMap::from([("WORKER_KEY".to_string(), "w".to_string())]),
            )
            .await
            .unwrap();

        assert_eq!(
            store.list_keys("app.example.com").await.unwrap(),
            vec!["ROUTE_KEY".to_string()]
        );
        assert_eq!(
            store
                .list_attachment_keys("app.example.com", "worker")
                .await
                .unwrap(),
            vec!["WORKER_KEY".to_string()]
        );

        store
            .delete_attachment("app.example.com", "worker", "WORKER_KEY")
            .await
            .unwrap();
        assert!(
            store
                .list_attachment_keys("app.example.com", "worker")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_domain_lists_empty() {
        let store = MemorySecretStore::new();
        assert!(store.list_keys("ghost.example.com").await.unwrap().is_empty());
        // Deleting from an unknown domain is a no-op, not an error.
        assert!(store.delete("ghost.example.com", "KEY").await.is_ok());
    }

    #[tokio::test]
    async fn unwired_runtime_reports_unavailable() {
        let runtime = UnwiredRuntime;
        assert!(matches!(
            runtime.list_networks().await,
            Err(Error::ServiceUnavailable("container runtime"))
        ));
    }
}

//! Route health checking.
//!
//! One probe task per route, bounded by a semaphore so a large route set
//! cannot open unbounded sockets. A route is only probed over HTTP when its
//! container reports `running`; anything else short-circuits with the
//! container status recorded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::Result;
use crate::model::RouteHealth;
use crate::service::{ConfigService, ContainerService, HttpProber};

/// Upper bound on probes in flight at any instant.
const MAX_CONCURRENT_PROBES: usize = 10;

/// Container status recorded when no container exists for a route.
const STATUS_NOT_FOUND: &str = "not found";

/// Bounded-parallel health checker over the whole route set.
pub struct HealthEngine {
    config: Arc<dyn ConfigService>,
    containers: Arc<dyn ContainerService>,
    prober: Arc<dyn HttpProber>,
    permits: Arc<Semaphore>,
}

impl HealthEngine {
    /// Create an engine over the given collaborators.
    #[must_use]
    pub fn new(
        config: Arc<dyn ConfigService>,
        containers: Arc<dyn ContainerService>,
        prober: Arc<dyn HttpProber>,
    ) -> Self {
        Self {
            config,
            containers,
            prober,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES)),
        }
    }

    /// Probe every configured route, returning results keyed by domain.
    ///
    /// Dropping the returned future aborts in-flight probes.
    pub async fn check_all_routes(&self) -> Result<HashMap<String, RouteHealth>> {
        let routes = self.config.routes().await?;
        let results: Arc<Mutex<HashMap<String, RouteHealth>>> =
            Arc::new(Mutex::new(HashMap::with_capacity(routes.len())));

        let mut tasks = JoinSet::new();
        for route in routes {
            let permits = Arc::clone(&self.permits);
            let containers = Arc::clone(&self.containers);
            let prober = Arc::clone(&self.prober);
            let results = Arc::clone(&results);

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let health = check_route(&*containers, &*prober, &route.domain).await;
                results.lock().insert(route.domain, health);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                debug!(error = %e, "Health probe task failed to join");
            }
        }

        let map = std::mem::take(&mut *results.lock());
        Ok(map)
    }
}

/// Probe a single route.
async fn check_route(
    containers: &dyn ContainerService,
    prober: &dyn HttpProber,
    domain: &str,
) -> RouteHealth {
    let container = match containers.get(domain).await {
        Ok(view) => view,
        Err(e) => {
            let mut health = RouteHealth::unprobed(domain, "unknown");
            health.error = Some(e.to_string());
            return health;
        }
    };

    let Some(container) = container else {
        return RouteHealth::unprobed(domain, STATUS_NOT_FOUND);
    };

    if container.status != "running" {
        return RouteHealth::unprobed(domain, &container.status);
    }

    let url = format!("https://{domain}/");
    match prober.probe(&url).await {
        Ok((status, elapsed_ms)) => RouteHealth {
            domain: domain.to_string(),
            container_status: container.status,
            http_status: Some(status),
            response_time_ms: Some(elapsed_ms),
            healthy: (200..400).contains(&status),
            error: None,
        },
        Err(e) => {
            let mut health = RouteHealth::unprobed(domain, &container.status);
            health.error = Some(e.to_string());
            health
        }
    }
}

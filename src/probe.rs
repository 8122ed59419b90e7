//! HTTP prober backing the health engine.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::Result;
use crate::service::HttpProber;

/// Prober built on a shared `reqwest` client with a per-request timeout.
pub struct ReqwestProber {
    client: reqwest::Client,
}

impl ReqwestProber {
    /// Create a prober whose requests abort after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProber for ReqwestProber {
    async fn probe(&self, url: &str) -> Result<(u16, u64)> {
        let started = Instant::now();
        let response = self.client.get(url).send().await?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok((response.status().as_u16(), elapsed_ms))
    }
}

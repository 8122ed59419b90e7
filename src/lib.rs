//! Gordon Library
//!
//! Lightweight single-node application platform: operators declare routes
//! mapping external hostnames to container images, and Gordon keeps a
//! container running per route, exposes an authenticated admin API, guards
//! an embedded image registry, and streams process and container logs.
//!
//! # Architecture
//!
//! - **Admin surface**: dispatch over a fixed resource taxonomy with uniform
//!   permission checks, bounded bodies and SSE log streaming
//! - **Auth pipeline**: two-tier rate limiting, bearer validation,
//!   scope-gated handlers, sliding-expiry token renewal
//! - **Registry auth**: Docker-v2 scopes, loopback bypass for the node's
//!   own pulls, challenge-response headers
//! - **Health engine**: bounded-parallel HTTP probing across all routes
//!
//! Long-lived state (routes, secrets, tokens, containers) lives behind the
//! collaborator traits in [`service`]; the core composes them and owns only
//! request-scoped values.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod limits;
pub mod model;
pub mod probe;
pub mod registry;
pub mod security;
pub mod server;
pub mod service;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

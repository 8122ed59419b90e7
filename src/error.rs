//! Error types for Gordon

use std::io;

use thiserror::Error;

/// Result type alias for Gordon
pub type Result<T> = std::result::Result<T, Error>;

/// Gordon errors
///
/// The first group are sentinel values matched by the admin handlers to pick
/// an HTTP status; everything else falls through to a generic 500 whose body
/// never carries the underlying error text.
#[derive(Error, Debug)]
pub enum Error {
    /// Route validation: the domain field is empty
    #[error("domain is empty")]
    RouteDomainEmpty,

    /// Route validation: the image field is empty
    #[error("image is empty")]
    RouteImageEmpty,

    /// No route exists for the given domain
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// No container exists for the given domain
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The image reference has no manifest in the registry
    #[error("image '{0}' not found")]
    ManifestNotFound(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication error
    #[error("authentication error: {0}")]
    Auth(String),

    /// An optional collaborator was not wired at startup
    #[error("{0} not available")]
    ServiceUnavailable(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// `true` for errors callers may legitimately trigger (bad input, missing
    /// resource) as opposed to faults inside Gordon or a collaborator.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::RouteDomainEmpty
                | Self::RouteImageEmpty
                | Self::RouteNotFound(_)
                | Self::ContainerNotFound(_)
                | Self::ManifestNotFound(_)
        )
    }
}

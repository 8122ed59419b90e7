//! Access-scope parsing and matching.
//!
//! Two grammars share one engine:
//!
//! - Admin scopes `admin:<resource>:<action>` guard the control surface.
//!   `<resource>` is `routes`, `secrets`, `config`, `status` or an extension
//!   tag; `<action>` is `read` or `write`; the literal `*` wildcards either
//!   segment.
//! - Registry scopes follow the Docker v2 form
//!   `repository:<name>:<comma-separated actions>` with actions from
//!   {`pull`, `push`}. The shorthand forms `pull`, `push` and `*` are legacy
//!   grants on every repository.
//!
//! A token grants an operation iff *any* of its scopes grants it.

use tracing::warn;

use crate::{Error, Result};

/// Registry-side action derived from the HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAction {
    /// Read: manifests, blobs, tag lists
    Pull,
    /// Write: uploads, deletes
    Push,
}

impl RegistryAction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "pull" => Some(Self::Pull),
            "push" => Some(Self::Push),
            _ => None,
        }
    }
}

/// One parsed access scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// `admin:<resource>:<action>`, either segment may be `*`
    Admin {
        /// Resource segment
        resource: String,
        /// Action segment
        action: String,
    },
    /// `repository:<name>:<actions>`; `name` may carry one trailing `*`
    Repository {
        /// Repository name pattern
        name: String,
        /// Granted actions
        actions: Vec<RegistryAction>,
    },
    /// Legacy shorthand (`pull`, `push`, `*`): a grant on every repository
    AllRepositories {
        /// Granted actions
        actions: Vec<RegistryAction>,
    },
}

impl Scope {
    /// Parse a single scope string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" => return Err(Error::Auth("empty scope".to_string())),
            "*" => {
                return Ok(Self::AllRepositories {
                    actions: vec![RegistryAction::Pull, RegistryAction::Push],
                });
            }
            "pull" => {
                return Ok(Self::AllRepositories {
                    actions: vec![RegistryAction::Pull],
                });
            }
            "push" => {
                return Ok(Self::AllRepositories {
                    actions: vec![RegistryAction::Push],
                });
            }
            _ => {}
        }

        let mut parts = s.splitn(3, ':');
        let kind = parts.next().unwrap_or_default();
        let name = parts.next();
        let actions = parts.next();

        match (kind, name, actions) {
            ("admin", Some(resource), Some(action)) if !resource.is_empty() && !action.is_empty() => {
                Ok(Self::Admin {
                    resource: resource.to_string(),
                    action: action.to_string(),
                })
            }
            ("repository", Some(name), Some(actions)) if !name.is_empty() => {
                let actions: Vec<RegistryAction> = actions
                    .split(',')
                    .filter_map(|a| RegistryAction::parse(a.trim()))
                    .collect();
                if actions.is_empty() {
                    return Err(Error::Auth(format!("scope '{s}' grants no known action")));
                }
                Ok(Self::Repository {
                    name: name.to_string(),
                    actions,
                })
            }
            _ => Err(Error::Auth(format!("malformed scope '{s}'"))),
        }
    }

    /// Whether this is an admin-form scope.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin { .. })
    }

    /// Whether this scope grants `(resource, action)` on the admin surface.
    #[must_use]
    pub fn grants_admin(&self, resource: &str, action: &str) -> bool {
        match self {
            Self::Admin {
                resource: r,
                action: a,
            } => (r == resource || r == "*") && (a == action || a == "*"),
            _ => false,
        }
    }

    /// Whether this scope grants `action` on registry repository `repo`.
    #[must_use]
    pub fn grants_repository(&self, repo: &str, action: RegistryAction) -> bool {
        match self {
            Self::Repository { name, actions } => {
                actions.contains(&action) && repo_pattern_matches(name, repo)
            }
            Self::AllRepositories { actions } => actions.contains(&action),
            Self::Admin { .. } => false,
        }
    }
}

/// Match a repository name pattern against a concrete repository.
///
/// One trailing `*` is a segment-aligned wildcard: `foo/*` matches `foo` and
/// `foo/bar` but never `foobar`. Without a wildcard the match is exact.
fn repo_pattern_matches(pattern: &str, repo: &str) -> bool {
    match pattern.strip_suffix('*') {
        None => pattern == repo,
        Some(prefix) => {
            let base = prefix.strip_suffix('/').unwrap_or(prefix);
            if base.is_empty() {
                return true;
            }
            repo == base
                || repo
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

/// Parse a claim's raw scope strings, dropping malformed entries.
///
/// A malformed scope is a deny-by-default: it grants nothing, and the rest of
/// the token stays usable.
#[must_use]
pub fn parse_scopes(raw: &[String]) -> Vec<Scope> {
    raw.iter()
        .filter_map(|s| match Scope::parse(s) {
            Ok(scope) => Some(scope),
            Err(e) => {
                warn!(scope = %s, error = %e, "Ignoring malformed scope");
                None
            }
        })
        .collect()
}

/// Whether any scope grants `(resource, action)` on the admin surface.
#[must_use]
pub fn has_access(scopes: &[Scope], resource: &str, action: &str) -> bool {
    scopes.iter().any(|s| s.grants_admin(resource, action))
}

/// Whether any scope grants `action` on registry repository `repo`.
#[must_use]
pub fn has_repository_access(scopes: &[Scope], repo: &str, action: RegistryAction) -> bool {
    scopes.iter().any(|s| s.grants_repository(repo, action))
}

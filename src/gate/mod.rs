//! Namespace admission
//!
//! A handshake is pending from the moment it is received until the gate
//! evaluates it; the returned [`Admission`] is terminal. Admission must
//! complete before any application listener is attached, so an admission
//! decision always happens-before the first application event on that
//! connection.
//!
//! Policy is per namespace:
//! - `Strict`: any authorization failure aborts the handshake. The connection
//!   never sees application events.
//! - `Permissive`: failures are admitted flagged. The transport stays open so
//!   the client can observe a structured failure signal, but only the
//!   error-reporting path is registered.

use crate::auth::{authenticate, AuthFailure, AuthOutcome, Credential, HandshakeMetadata};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Valid characters for a namespace identifier
fn is_valid_namespace_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("invalid namespace '{0}': must match [a-zA-Z0-9_-]+")]
    InvalidName(String),
}

/// A validated namespace identifier. Empty means the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// The default namespace (no sub-channel)
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a namespace name, with or without a leading slash
    pub fn parse(name: &str) -> Result<Self, NamespaceError> {
        let name = name.strip_prefix('/').unwrap_or(name);

        if name.is_empty() {
            return Ok(Self::root());
        }

        if !name.chars().all(is_valid_namespace_char) {
            return Err(NamespaceError::InvalidName(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// Enforcement mode applied when authorization fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// Reject the handshake outright
    Strict,
    /// Keep the transport open and signal the failure
    Permissive,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Strict => write!(f, "strict"),
            PolicyMode::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(PolicyMode::Strict),
            "permissive" => Ok(PolicyMode::Permissive),
            other => Err(format!(
                "invalid policy mode: {}. Must be strict or permissive",
                other
            )),
        }
    }
}

/// Per-namespace enforcement modes. Built at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    fallback: PolicyMode,
    named: HashMap<Namespace, PolicyMode>,
}

impl PolicyTable {
    /// Create a table where unlisted namespaces get `fallback`
    pub fn new(fallback: PolicyMode) -> Self {
        Self {
            fallback,
            named: HashMap::new(),
        }
    }

    /// Set the mode for one namespace
    pub fn set(&mut self, namespace: Namespace, mode: PolicyMode) {
        self.named.insert(namespace, mode);
    }

    /// Look up the mode for a namespace
    pub fn mode_for(&self, namespace: &Namespace) -> PolicyMode {
        self.named.get(namespace).copied().unwrap_or(self.fallback)
    }

    /// The playground default: permissive root namespace, strict everywhere
    /// else, so failure verdicts stay observable on the default channel.
    pub fn playground() -> Self {
        let mut table = Self::new(PolicyMode::Strict);
        table.set(Namespace::root(), PolicyMode::Permissive);
        table
    }
}

/// A received handshake, not yet evaluated
#[derive(Debug, Clone)]
pub struct Handshake {
    pub namespace: Namespace,
    pub metadata: HandshakeMetadata,
}

/// Authorization attached to an admitted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAuth {
    /// Verified credential; application listeners may be registered.
    Authorized(Credential),
    /// Admitted under permissive policy with a failure verdict. Only the
    /// error-reporting path may be registered.
    Unauthorized(AuthFailure),
}

impl SessionAuth {
    pub fn is_authorized(&self) -> bool {
        matches!(self, SessionAuth::Authorized(_))
    }
}

/// Terminal outcome of admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Hand the connection over; `auth` says which listener paths to register.
    Admitted { auth: SessionAuth, mode: PolicyMode },
    /// Abort the handshake before any listener is attached.
    Denied { failure: AuthFailure, mode: PolicyMode },
}

/// Per-namespace admission filter.
///
/// Holds only read-only state (shared secret, policy table), so concurrent
/// evaluations need no locking.
pub struct NamespaceGate {
    secret: Vec<u8>,
    policies: PolicyTable,
}

impl NamespaceGate {
    pub fn new(secret: Vec<u8>, policies: PolicyTable) -> Self {
        Self { secret, policies }
    }

    /// Evaluate a pending handshake at time `now`.
    pub fn admit(&self, handshake: &Handshake, now: u64) -> Admission {
        let mode = self.policies.mode_for(&handshake.namespace);

        match authenticate(&handshake.metadata, &self.secret, now) {
            AuthOutcome::Authorized(credential) => Admission::Admitted {
                auth: SessionAuth::Authorized(credential),
                mode,
            },
            AuthOutcome::Failed(failure) => match mode {
                PolicyMode::Strict => Admission::Denied { failure, mode },
                PolicyMode::Permissive => Admission::Admitted {
                    auth: SessionAuth::Unauthorized(failure),
                    mode,
                },
            },
        }
    }
}

//! Handshake authentication
//!
//! Browser WebSocket upgrades cannot carry custom headers, so the credential
//! rides in the handshake metadata (query parameters) as a bearer-prefixed
//! value: `Authorization=Bearer <token>`.
//!
//! Authentication is synchronous and side-effect free. The shared secret is
//! process-resident configuration; nothing here touches I/O, and any decode
//! fault is converted to a verdict at this boundary.

use crate::auth::credential::{Credential, VerifyStatus};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Metadata field carrying the credential
pub const AUTHORIZATION_FIELD: &str = "Authorization";

/// Scheme prefix stripped before decoding
pub const BEARER_PREFIX: &str = "Bearer ";

/// Key-value pairs supplied at connection-setup time, read-only after connect
pub type HandshakeMetadata = HashMap<String, String>;

/// Why a handshake failed authorization.
///
/// All four are authorization failures, never transport errors. A missing
/// field is reported separately from a present-but-undecodable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    #[error("no credential in handshake metadata")]
    MissingCredential,

    #[error("credential could not be decoded")]
    MalformedCredential,

    #[error("credential signature does not verify")]
    BadSignature,

    #[error("credential has expired")]
    Expired,
}

/// Verdict for an inbound handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credential decoded and verified; carries the accepted credential.
    Authorized(Credential),
    /// Authorization failed with the given verdict.
    Failed(AuthFailure),
}

impl AuthOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthOutcome::Authorized(_))
    }
}

/// Authenticate a connection from its handshake metadata.
///
/// Extracts the bearer value from the `Authorization` field, decodes it and
/// verifies it against `secret` at time `now`.
pub fn authenticate(metadata: &HandshakeMetadata, secret: &[u8], now: u64) -> AuthOutcome {
    let raw = match metadata.get(AUTHORIZATION_FIELD) {
        Some(value) if !value.trim().is_empty() => value.as_str(),
        _ => return AuthOutcome::Failed(AuthFailure::MissingCredential),
    };

    let token = match raw.strip_prefix(BEARER_PREFIX) {
        // "Bearer " with nothing after it: there is no credential to decode
        Some(rest) if rest.trim().is_empty() => {
            return AuthOutcome::Failed(AuthFailure::MissingCredential)
        }
        Some(rest) => rest,
        None => return AuthOutcome::Failed(AuthFailure::MalformedCredential),
    };

    let credential = match Credential::decode(token) {
        Ok(credential) => credential,
        Err(_) => return AuthOutcome::Failed(AuthFailure::MalformedCredential),
    };

    match credential.verify(secret, now) {
        VerifyStatus::Authorized => AuthOutcome::Authorized(credential),
        VerifyStatus::Expired => AuthOutcome::Failed(AuthFailure::Expired),
        VerifyStatus::BadSignature => AuthOutcome::Failed(AuthFailure::BadSignature),
    }
}

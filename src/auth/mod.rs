//! Authentication and authorization
//!
//! Credential wire format:
//! - `cap-` prefix: stateless capability credential (self-contained, signed)
//!
//! Verdicts:
//! - `MissingCredential`: designated metadata field absent or empty
//! - `MalformedCredential`: field present but the value does not decode
//! - `BadSignature`: payload does not verify against the shared secret
//! - `Expired`: signature verifies but the ttl window has passed

mod authenticator;
mod credential;

pub use authenticator::{
    authenticate, AuthFailure, AuthOutcome, HandshakeMetadata, AUTHORIZATION_FIELD, BEARER_PREFIX,
};
pub use credential::{unix_now, Credential, CredentialError, VerifyStatus, CREDENTIAL_PREFIX};

//! Credential issuance and verification
//!
//! Wire format: `cap-<payload>.<signature>`
//! - payload: base64url (no padding) of the JSON claims `{"iat": .., "exp": ..}`
//! - signature: base64url of the first 16 bytes of HMAC-SHA256(secret, payload)
//!
//! A credential proves possession of the shared secret at issuance time, not
//! identity. It is immutable once issued and expires on its own; there is no
//! revocation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Prefix identifying a capability credential
pub const CREDENTIAL_PREFIX: &str = "cap-";

/// HMAC bytes kept in the wire signature
const SIGNATURE_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid credential prefix: expected '{expected}', got '{got}'")]
    InvalidPrefix { expected: String, got: String },

    #[error("invalid credential format")]
    InvalidFormat,

    #[error("credential decode error: {0}")]
    DecodeError(String),
}

/// Outcome of checking a decoded credential against the shared secret.
///
/// The signature is checked before the timestamps: a tampered payload must
/// never pass on its (attacker-chosen) expiry alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Authorized,
    Expired,
    BadSignature,
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyStatus::Authorized => write!(f, "authorized"),
            VerifyStatus::Expired => write!(f, "expired"),
            VerifyStatus::BadSignature => write!(f, "bad signature"),
        }
    }
}

/// Time-bound claims carried in the credential payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialClaims {
    iat: u64,
    exp: u64,
}

/// A signed, time-bounded capability credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    issued_at: u64,
    expires_at: u64,
    signature: Vec<u8>,
}

impl Credential {
    /// Issue a credential valid for `ttl_secs` starting at `now` (unix seconds)
    pub fn issue(secret: &[u8], ttl_secs: u64, now: u64) -> Self {
        let claims = CredentialClaims {
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };
        let payload_b64 = encode_claims(&claims);
        let signature = sign(secret, payload_b64.as_bytes());

        Self {
            issued_at: claims.iat,
            expires_at: claims.exp,
            signature,
        }
    }

    /// Serialize to the transport-safe token string. Deterministic.
    pub fn encode(&self) -> String {
        format!(
            "{}{}.{}",
            CREDENTIAL_PREFIX,
            self.payload_b64(),
            URL_SAFE_NO_PAD.encode(&self.signature)
        )
    }

    /// Parse a token string. Does not check the signature; see [`Self::verify`].
    pub fn decode(token: &str) -> Result<Self, CredentialError> {
        let content = token.strip_prefix(CREDENTIAL_PREFIX).ok_or_else(|| {
            CredentialError::InvalidPrefix {
                expected: CREDENTIAL_PREFIX.to_string(),
                got: token.chars().take(4).collect(),
            }
        })?;

        let parts: Vec<&str> = content.split('.').collect();
        if parts.len() != 2 {
            return Err(CredentialError::InvalidFormat);
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(parts[0])
            .map_err(|e| CredentialError::DecodeError(e.to_string()))?;

        let claims: CredentialClaims = serde_json::from_slice(&payload_json)
            .map_err(|e| CredentialError::DecodeError(e.to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| CredentialError::DecodeError(e.to_string()))?;

        Ok(Self {
            issued_at: claims.iat,
            expires_at: claims.exp,
            signature,
        })
    }

    /// Check the credential against the shared secret at time `now`.
    ///
    /// Pure function, no I/O. Signature first, expiry second.
    pub fn verify(&self, secret: &[u8], now: u64) -> VerifyStatus {
        let expected = sign(secret, self.payload_b64().as_bytes());

        if !constant_time_eq(&self.signature, &expected) {
            return VerifyStatus::BadSignature;
        }

        if now > self.expires_at {
            return VerifyStatus::Expired;
        }

        VerifyStatus::Authorized
    }

    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    fn payload_b64(&self) -> String {
        encode_claims(&CredentialClaims {
            iat: self.issued_at,
            exp: self.expires_at,
        })
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

fn encode_claims(claims: &CredentialClaims) -> String {
    let json = serde_json::to_vec(claims).expect("serialize claims");
    URL_SAFE_NO_PAD.encode(&json)
}

fn sign(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    digest[..SIGNATURE_LEN].to_vec()
}

// Constant-time comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test-secret-key-for-signing";

    #[test]
    fn test_issue_encode_decode_round_trip() {
        let credential = Credential::issue(TEST_SECRET, 3600, 1_700_000_000);
        assert!(credential.encode().starts_with(CREDENTIAL_PREFIX));

        let decoded = Credential::decode(&credential.encode()).unwrap();
        assert_eq!(decoded, credential);
        assert_eq!(decoded.issued_at(), 1_700_000_000);
        assert_eq!(decoded.expires_at(), 1_700_003_600);
    }

    #[test]
    fn test_verify_within_ttl_window() {
        let credential = Credential::issue(TEST_SECRET, 3600, 1_700_000_000);

        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_000_000),
            VerifyStatus::Authorized
        );
        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_001_800),
            VerifyStatus::Authorized
        );
        // Boundary: exactly at expiry is still valid
        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_003_600),
            VerifyStatus::Authorized
        );
        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_003_601),
            VerifyStatus::Expired
        );
    }

    #[test]
    fn test_zero_ttl_expires_one_second_later() {
        let credential = Credential::issue(TEST_SECRET, 0, 1_700_000_000);

        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_000_000),
            VerifyStatus::Authorized
        );
        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_000_001),
            VerifyStatus::Expired
        );
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let credential = Credential::issue(TEST_SECRET, 3600, 1_700_000_000);

        assert_eq!(
            credential.verify(b"wrong-secret", 1_700_000_001),
            VerifyStatus::BadSignature
        );
    }

    #[test]
    fn test_tampered_signature_beats_valid_timestamps() {
        let mut credential = Credential::issue(TEST_SECRET, 3600, 1_700_000_000);
        credential.signature[0] ^= 0xff;

        // Still inside the ttl window, but the signature check comes first
        assert_eq!(
            credential.verify(TEST_SECRET, 1_700_000_001),
            VerifyStatus::BadSignature
        );
    }

    #[test]
    fn test_tampered_payload_beats_valid_timestamps() {
        let credential = Credential::issue(TEST_SECRET, 0, 1_700_000_000);

        // Forge an extended expiry while keeping the original signature
        let forged = Credential {
            issued_at: credential.issued_at,
            expires_at: credential.expires_at + 86_400,
            signature: credential.signature.clone(),
        };

        assert_eq!(
            forged.verify(TEST_SECRET, 1_700_000_500),
            VerifyStatus::BadSignature
        );
    }

    #[test]
    fn test_decode_missing_prefix() {
        let result = Credential::decode("InvalidAccessToken");
        assert!(matches!(result, Err(CredentialError::InvalidPrefix { .. })));
    }

    #[test]
    fn test_decode_wrong_part_count() {
        assert!(matches!(
            Credential::decode("cap-onlyonepart"),
            Err(CredentialError::InvalidFormat)
        ));
        assert!(matches!(
            Credential::decode("cap-a.b.c"),
            Err(CredentialError::InvalidFormat)
        ));
    }

    #[test]
    fn test_decode_bad_base64() {
        let result = Credential::decode("cap-not!base64.alsonot!base64");
        assert!(matches!(result, Err(CredentialError::DecodeError(_))));
    }

    #[test]
    fn test_decode_truncated_token() {
        let credential = Credential::issue(TEST_SECRET, 3600, 1_700_000_000);
        let encoded = credential.encode();
        let truncated = &encoded[..encoded.len() / 2];

        assert!(Credential::decode(truncated).is_err());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let credential = Credential::issue(TEST_SECRET, 3600, 1_700_000_000);
        assert_eq!(credential.encode(), credential.encode());
    }
}

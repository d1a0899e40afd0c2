//! Wire protocol
//!
//! Messages are JSON objects with a `type` tag. The failure signal
//! (`auth_error`) is distinct from application events so clients can branch
//! on it.

use crate::auth::AuthFailure;
use serde::{Deserialize, Serialize};

/// Messages from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Application event addressed to the handler
    Event {
        name: String,
        payload: serde_json::Value,
    },
    /// Ping for keepalive
    Ping { seq: u64 },
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Advisory greeting after an authorized admission
    Welcome { message: String },
    /// Application event from the handler
    Event {
        name: String,
        payload: serde_json::Value,
    },
    /// Structured authorization failure signal
    AuthError {
        kind: AuthFailure,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Pong response
    Pong { seq: u64 },
    /// Protocol-level error
    Error { message: String },
}

impl ServerMessage {
    /// Build the failure signal for a verdict, with its human-readable detail
    pub fn auth_error(kind: AuthFailure) -> Self {
        ServerMessage::AuthError {
            kind,
            detail: Some(kind.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_parse_event() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"event","name":"new-message","payload":"hi"}"#)
                .unwrap();

        match msg {
            ClientMessage::Event { name, payload } => {
                assert_eq!(name, "new-message");
                assert_eq!(payload, json!("hi"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_client_message_parse_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping","seq":7}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping { seq: 7 }));
    }

    #[test]
    fn test_client_message_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"auth","token":"x"}"#).is_err());
    }

    #[test]
    fn test_auth_error_wire_shape() {
        let msg = ServerMessage::auth_error(AuthFailure::BadSignature);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "auth_error");
        assert_eq!(value["kind"], "bad_signature");
        assert_eq!(value["detail"], "credential signature does not verify");
    }

    #[test]
    fn test_auth_error_detail_omitted_when_absent() {
        let msg = ServerMessage::AuthError {
            kind: AuthFailure::Expired,
            detail: None,
        };
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["kind"], "expired");
        assert!(value.get("detail").is_none());
    }

    #[test]
    fn test_failure_kinds_serialize_snake_case() {
        for (kind, expected) in [
            (AuthFailure::MissingCredential, "missing_credential"),
            (AuthFailure::MalformedCredential, "malformed_credential"),
            (AuthFailure::BadSignature, "bad_signature"),
            (AuthFailure::Expired, "expired"),
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), expected);
        }
    }

    #[test]
    fn test_welcome_wire_shape() {
        let value =
            serde_json::to_value(ServerMessage::Welcome { message: "hello".to_string() }).unwrap();
        assert_eq!(value["type"], "welcome");
        assert_eq!(value["message"], "hello");
    }
}

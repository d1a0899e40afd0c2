//! Tollgate - bearer-token admission gateway for WebSocket message channels
//!
//! WebSocket transports have no usable header channel for browser clients,
//! so tollgate carries a short-lived signed credential in the handshake query
//! string, validates it before any application listener is attached, and
//! enforces a per-namespace policy: strict namespaces reject failed
//! handshakes outright, permissive ones keep the connection open and answer
//! with a structured failure signal.

pub mod auth;
pub mod gate;
pub mod handler;
pub mod server;

pub use auth::{authenticate, AuthFailure, AuthOutcome, Credential, VerifyStatus};
pub use gate::{Admission, Namespace, NamespaceGate, PolicyMode, PolicyTable, SessionAuth};
pub use handler::{AppEvent, EchoHandler, EventHandler};
pub use server::{ClientMessage, ServerMessage, Session, WsState};

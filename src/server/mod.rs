//! Tollgate server implementation
//!
//! Handles the issuance endpoint, WebSocket handshakes and per-session
//! message dispatch.

mod connections;
pub mod protocol;
pub mod websocket;

pub use connections::{AuthState, ConnectionManager, Session};
pub use protocol::{ClientMessage, ServerMessage};
pub use websocket::{create_router, handle_client_message, run_server, IssueResponse, WsState};

//! WebSocket server implementation
//!
//! Admission runs during the HTTP upgrade, before `on_upgrade` attaches any
//! listener: a denied handshake is answered with 401 and the connection never
//! sees application events. The token issuance endpoint lives on the same
//! router so the demo is self-contained; the live-connection path shares
//! nothing with it beyond the signing secret.

use crate::auth::{unix_now, AuthFailure, Credential};
use crate::gate::{Admission, Handshake, Namespace, NamespaceGate, PolicyTable, SessionAuth};
use crate::handler::EventHandler;
use crate::server::connections::{AuthState, ConnectionManager, Session};
use crate::server::protocol::{ClientMessage, ServerMessage};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shared state for the HTTP and WebSocket handlers
#[derive(Clone)]
pub struct WsState {
    pub connections: Arc<ConnectionManager>,
    pub gate: Arc<NamespaceGate>,
    pub handler: Arc<dyn EventHandler>,
    pub secret: Vec<u8>,
    pub token_ttl_secs: u64,
}

impl WsState {
    pub fn new(
        secret: Vec<u8>,
        token_ttl_secs: u64,
        policies: PolicyTable,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new()),
            gate: Arc::new(NamespaceGate::new(secret.clone(), policies)),
            handler,
            secret,
            token_ttl_secs,
        }
    }
}

/// Response body of the issuance endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub message: String,
    pub access_token: String,
}

/// Create the router
pub fn create_router(state: WsState) -> Router {
    Router::new()
        .route("/access-token", get(issue_token_handler))
        .route("/ws", get(ws_root_handler))
        .route("/ws/{namespace}", get(ws_namespace_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Token service: mint a fresh credential on demand
async fn issue_token_handler(State(state): State<WsState>) -> Json<IssueResponse> {
    let credential = Credential::issue(&state.secret, state.token_ttl_secs, unix_now());

    Json(IssueResponse {
        message: "Now you can connect to the live channel.".to_string(),
        access_token: credential.encode(),
    })
}

async fn ws_root_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<WsState>,
) -> Response {
    admit_and_upgrade(ws, Namespace::root(), params, state)
}

async fn ws_namespace_handler(
    ws: WebSocketUpgrade,
    Path(namespace): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<WsState>,
) -> Response {
    let namespace = match Namespace::parse(&namespace) {
        Ok(namespace) => namespace,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };

    admit_and_upgrade(ws, namespace, params, state)
}

/// Evaluate the handshake before upgrading. A strict denial aborts here, so
/// the rejected connection never gets a WebSocket at all.
fn admit_and_upgrade(
    ws: WebSocketUpgrade,
    namespace: Namespace,
    metadata: HashMap<String, String>,
    state: WsState,
) -> Response {
    let handshake = Handshake {
        namespace: namespace.clone(),
        metadata,
    };

    match state.gate.admit(&handshake, unix_now()) {
        Admission::Denied { failure, .. } => {
            info!(namespace = %namespace, verdict = %failure, "handshake denied");
            (StatusCode::UNAUTHORIZED, failure.to_string()).into_response()
        }
        Admission::Admitted { auth, .. } => {
            ws.on_upgrade(move |socket| handle_socket(socket, namespace, auth, state))
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    namespace: Namespace,
    auth: SessionAuth,
    state: WsState,
) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(100);
    let session = Arc::new(Session::new(namespace.clone(), tx));
    session.apply_admission(AuthState::from(&auth));

    let conn_id = session.id;
    state.connections.add(session.clone());

    // Spawn task to forward outbound messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Admission outcome is delivered first; if the transport already died,
    // the sends fail and the result is simply discarded.
    match &auth {
        SessionAuth::Authorized(credential) => {
            info!(
                conn_id = %conn_id,
                namespace = %namespace,
                expires_at = credential.expires_at(),
                active = state.connections.count(),
                "client authorized"
            );
            let _ = session
                .send(ServerMessage::Welcome {
                    message: welcome_message(&namespace),
                })
                .await;
            for event in state.handler.on_connect(&session).await {
                let _ = session
                    .send(ServerMessage::Event {
                        name: event.name,
                        payload: event.payload,
                    })
                    .await;
            }
        }
        SessionAuth::Unauthorized(failure) => {
            info!(
                conn_id = %conn_id,
                namespace = %namespace,
                verdict = %failure,
                "client admitted without authorization"
            );
            let _ = session.send(ServerMessage::auth_error(*failure)).await;
        }
    }

    // Process incoming messages
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&msg, &session, &state).await,
                Err(e) => {
                    let _ = session
                        .send(ServerMessage::Error {
                            message: format!("invalid message: {}", e),
                        })
                        .await;
                }
            },
            Ok(Message::Binary(data)) => match serde_json::from_slice::<ClientMessage>(&data) {
                Ok(msg) => handle_client_message(&msg, &session, &state).await,
                Err(e) => {
                    let _ = session
                        .send(ServerMessage::Error {
                            message: format!("invalid message: {}", e),
                        })
                        .await;
                }
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Handled automatically by axum
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    debug!(conn_id = %conn_id, "client disconnected");
    state.connections.remove(conn_id);
    send_task.abort();
}

/// Handle a single decoded client message for an admitted session.
///
/// Application events reach the handler only on authorized sessions; a
/// rejected session gets the structured failure signal back instead, so a
/// client that keeps sending after a failed handshake sees errors, not
/// silence.
pub async fn handle_client_message(msg: &ClientMessage, session: &Arc<Session>, state: &WsState) {
    match msg {
        ClientMessage::Ping { seq } => {
            let _ = session.send(ServerMessage::Pong { seq: *seq }).await;
        }
        ClientMessage::Event { name, payload } => match session.auth_state() {
            AuthState::Authorized => {
                for event in state
                    .handler
                    .on_event(session, name, payload.clone())
                    .await
                {
                    let _ = session
                        .send(ServerMessage::Event {
                            name: event.name,
                            payload: event.payload,
                        })
                        .await;
                }
            }
            AuthState::Rejected(failure) => {
                let _ = session.send(ServerMessage::auth_error(failure)).await;
            }
            // An unadmitted session has no credential on record
            AuthState::Unverified => {
                let _ = session
                    .send(ServerMessage::auth_error(AuthFailure::MissingCredential))
                    .await;
            }
        },
    }
}

fn welcome_message(namespace: &Namespace) -> String {
    if namespace.is_root() {
        "message relay ready".to_string()
    } else {
        format!("message relay ready, from {} namespace", namespace)
    }
}

/// Run the server
pub async fn run_server(bind_addr: SocketAddr, state: WsState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "tollgate listening");

    axum::serve(listener, app).await?;

    Ok(())
}

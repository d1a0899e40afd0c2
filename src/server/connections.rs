//! Connection state management

use crate::auth::AuthFailure;
use crate::gate::{Namespace, SessionAuth};
use crate::server::protocol::ServerMessage;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Authorization state of a live connection.
///
/// Starts `Unverified`; the gate's admission result moves it to exactly one
/// terminal state before any application event is delivered. A `Rejected`
/// session under permissive policy keeps its transport open but never
/// upgrades without reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unverified,
    Authorized,
    Rejected(AuthFailure),
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthState::Unverified)
    }
}

impl From<&SessionAuth> for AuthState {
    fn from(auth: &SessionAuth) -> Self {
        match auth {
            SessionAuth::Authorized(_) => AuthState::Authorized,
            SessionAuth::Unauthorized(failure) => AuthState::Rejected(*failure),
        }
    }
}

/// A live client connection
pub struct Session {
    /// Unique connection ID
    pub id: Uuid,
    /// Namespace this connection was admitted to
    pub namespace: Namespace,
    /// Authorization state, written once by the admission path
    auth: RwLock<AuthState>,
    /// Channel for sending messages to this client
    tx: mpsc::Sender<ServerMessage>,
}

impl Session {
    pub fn new(namespace: Namespace, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace,
            auth: RwLock::new(AuthState::Unverified),
            tx,
        }
    }

    /// Apply the admission result. The state moves from `Unverified` to a
    /// terminal state exactly once; later writes are ignored.
    pub fn apply_admission(&self, state: AuthState) {
        let mut auth = self.auth.write();
        if !auth.is_terminal() {
            *auth = state;
        }
    }

    pub fn auth_state(&self) -> AuthState {
        *self.auth.read()
    }

    pub fn is_authorized(&self) -> bool {
        matches!(*self.auth.read(), AuthState::Authorized)
    }

    /// The failure verdict for a rejected session
    pub fn failure(&self) -> Option<AuthFailure> {
        match *self.auth.read() {
            AuthState::Rejected(failure) => Some(failure),
            _ => None,
        }
    }

    /// Queue a message for delivery to this client
    pub async fn send(
        &self,
        msg: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.tx.send(msg).await
    }
}

/// Manages all active connections
#[derive(Clone)]
pub struct ConnectionManager {
    sessions: Arc<DashMap<Uuid, Arc<Session>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Register a new connection
    pub fn add(&self, session: Arc<Session>) {
        self.sessions.insert(session.id, session);
    }

    /// Remove a connection
    pub fn remove(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Get a connection by ID
    pub fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| r.clone())
    }

    /// Get total connection count
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Count connections admitted to a namespace
    pub fn count_in(&self, namespace: &Namespace) -> usize {
        self.sessions
            .iter()
            .filter(|entry| &entry.value().namespace == namespace)
            .count()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(namespace: &str) -> Arc<Session> {
        let (tx, _rx) = mpsc::channel(10);
        Arc::new(Session::new(Namespace::parse(namespace).unwrap(), tx))
    }

    #[test]
    fn test_session_starts_unverified() {
        let session = session("");
        assert_eq!(session.auth_state(), AuthState::Unverified);
        assert!(!session.is_authorized());
        assert!(session.failure().is_none());
    }

    #[test]
    fn test_admission_is_applied_once() {
        let session = session("");
        session.apply_admission(AuthState::Rejected(AuthFailure::BadSignature));

        // A second write must not overturn the terminal state
        session.apply_admission(AuthState::Authorized);

        assert_eq!(
            session.auth_state(),
            AuthState::Rejected(AuthFailure::BadSignature)
        );
        assert_eq!(session.failure(), Some(AuthFailure::BadSignature));
    }

    #[test]
    fn test_authorized_session() {
        let session = session("secret");
        session.apply_admission(AuthState::Authorized);

        assert!(session.is_authorized());
        assert!(session.failure().is_none());
    }

    #[test]
    fn test_manager_add_remove() {
        let manager = ConnectionManager::new();
        let session = session("");
        let id = session.id;

        manager.add(session);
        assert_eq!(manager.count(), 1);
        assert!(manager.get(id).is_some());

        manager.remove(id);
        assert_eq!(manager.count(), 0);
        assert!(manager.get(id).is_none());
    }

    #[test]
    fn test_manager_count_per_namespace() {
        let manager = ConnectionManager::new();
        manager.add(session(""));
        manager.add(session("secret"));
        manager.add(session("secret"));

        assert_eq!(manager.count(), 3);
        assert_eq!(manager.count_in(&Namespace::root()), 1);
        assert_eq!(manager.count_in(&Namespace::parse("secret").unwrap()), 2);
        assert_eq!(manager.count_in(&Namespace::parse("area51").unwrap()), 0);
    }
}

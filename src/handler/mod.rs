//! Application handler boundary
//!
//! The gate hands verified connections to an [`EventHandler`]; everything
//! behind the trait is opaque to the admission path. Handlers only ever see
//! authorized sessions.

use crate::server::Session;
use async_trait::async_trait;

/// An application-level event emitted back to a client
#[derive(Debug, Clone)]
pub struct AppEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl AppEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Business event handler invoked after authorization succeeds
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called once when an authorized session is admitted
    async fn on_connect(&self, session: &Session) -> Vec<AppEvent>;

    /// Called for each application event from an authorized session
    async fn on_event(
        &self,
        session: &Session,
        name: &str,
        payload: serde_json::Value,
    ) -> Vec<AppEvent>;
}

/// Demo handler: answers every `new-message` with a `message-received` echo
pub struct EchoHandler;

#[async_trait]
impl EventHandler for EchoHandler {
    async fn on_connect(&self, _session: &Session) -> Vec<AppEvent> {
        Vec::new()
    }

    async fn on_event(
        &self,
        _session: &Session,
        name: &str,
        payload: serde_json::Value,
    ) -> Vec<AppEvent> {
        match name {
            "new-message" => vec![AppEvent::new("message-received", payload)],
            _ => Vec::new(),
        }
    }
}

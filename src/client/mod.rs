pub mod auth;
pub mod channel;
pub mod connectivity;
pub mod offline_store;
pub mod runner;
pub mod session;

use time::OffsetDateTime;

use crate::protocol::{ChatMessage, ClientEvent};

pub use connectivity::{Connectivity, ConnectivityMonitor, Link, LinkTracker, Transition};
pub use offline_store::OfflineStore;
pub use session::Session;

/// A message composed while offline, waiting for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Offline store key; `None` when the store was unavailable.
    pub id: Option<i64>,
    pub username: String,
    pub message: String,
    pub room: String,
    pub timestamp: OffsetDateTime,
}

impl QueuedMessage {
    pub fn to_event(&self) -> ClientEvent {
        ClientEvent::ChatMessage {
            username: self.username.clone(),
            message: self.message.clone(),
            room: self.room.clone(),
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            username: self.username.clone(),
            message: self.message.clone(),
            room: self.room.clone(),
            timestamp: self.timestamp,
        }
    }
}

pub trait EventSink {
    /// Fire and forget; delivery is at most once.
    fn emit(&mut self, event: ClientEvent);
}

pub trait Renderer {
    /// `offline` marks a local echo of a queued message.
    fn render(&mut self, message: &ChatMessage, offline: bool);

    /// Called for messages from other people, after `render`.
    fn notify(&mut self, _message: &ChatMessage) {}

    fn clear(&mut self);

    /// `None` once nobody is typing.
    fn typing(&mut self, username: Option<&str>);
}

impl EventSink for Vec<ClientEvent> {
    fn emit(&mut self, event: ClientEvent) {
        self.push(event);
    }
}

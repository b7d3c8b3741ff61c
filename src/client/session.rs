use std::{collections::VecDeque, time::Duration};

use time::OffsetDateTime;
use tokio::time::Instant;

use crate::protocol::{ChatMessage, ClientEvent, ServerEvent};

use super::{
    Connectivity, ConnectivityMonitor, EventSink, OfflineStore, QueuedMessage, Renderer, Transition,
};

/// Quiet period after the last keystroke before "stopped typing" is sent.
pub const TYPING_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub room: String,
}

pub struct Session<S, R> {
    sink: S,
    renderer: R,
    store: OfflineStore,
    monitor: ConnectivityMonitor,
    queue: VecDeque<QueuedMessage>,
    identity: Option<Identity>,
    /// Deadline for the stop event and the room it goes to.
    typing: Option<(Instant, String)>,
}

impl<S: EventSink, R: Renderer> Session<S, R> {
    pub fn new(sink: S, renderer: R, store: OfflineStore, connectivity: Connectivity) -> Self {
        Session {
            sink,
            renderer,
            store,
            monitor: ConnectivityMonitor::new(connectivity),
            queue: VecDeque::new(),
            identity: None,
            typing: None,
        }
    }

    /// Reloads messages left in the offline store by an earlier run.
    pub async fn restore(&mut self) {
        self.queue = self.store.load_all().await.into();
        if !self.queue.is_empty() {
            tracing::info!(pending = self.queue.len(), "restored offline messages");
        }
    }

    pub fn join(&mut self, username: impl Into<String>, room: impl Into<String>) {
        let identity = Identity {
            username: username.into(),
            room: room.into(),
        };
        self.renderer.clear();
        self.sink.emit(ClientEvent::JoinRoom {
            username: identity.username.clone(),
            room: identity.room.clone(),
        });
        self.identity = Some(identity);
    }

    pub async fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let Some(identity) = &self.identity else {
            tracing::debug!("message dropped, no room joined");
            return;
        };

        let mut queued = QueuedMessage {
            id: None,
            username: identity.username.clone(),
            message: text.to_owned(),
            room: identity.room.clone(),
            timestamp: OffsetDateTime::now_utc(),
        };

        if self.monitor.is_online() {
            self.sink.emit(queued.to_event());
            return;
        }

        queued.id = self.store.save(&queued).await;
        tracing::info!(id = ?queued.id, "offline, message queued for later sending");
        self.renderer.render(&queued.to_chat_message(), true);
        self.queue.push_back(queued);
    }

    pub fn notify_typing(&mut self, now: Instant) {
        let Some(identity) = &self.identity else {
            return;
        };
        self.sink.emit(ClientEvent::Typing {
            username: identity.username.clone(),
            room: identity.room.clone(),
        });
        self.typing = Some((now + TYPING_TIMEOUT, identity.room.clone()));
    }

    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Sends the stop event once the typing deadline has passed.
    pub fn poll_typing(&mut self, now: Instant) {
        match &self.typing {
            Some((deadline, _)) if now >= *deadline => {}
            _ => return,
        }
        if let Some((_, room)) = self.typing.take() {
            self.sink.emit(ClientEvent::Typing {
                username: String::new(),
                room,
            });
        }
    }

    pub fn clear_chat(&mut self) {
        let Some(identity) = &self.identity else {
            return;
        };
        self.renderer.clear();
        self.sink.emit(ClientEvent::ClearChat { room: identity.room.clone() });
        let notice = ChatMessage::system(
            &identity.room,
            format!("Chat has been cleared by {}", identity.username),
        );
        self.renderer.render(&notice, false);
    }

    pub async fn set_connectivity(&mut self, connectivity: Connectivity) {
        match self.monitor.observe(connectivity) {
            Some(Transition::Lost) => {
                tracing::warn!("connection lost, messages will be queued");
            }
            Some(Transition::Restored) => {
                tracing::info!(pending = self.queue.len(), "connection restored");
                // a fresh connection starts without any room membership
                if let Some(identity) = self.identity.clone() {
                    self.join(identity.username, identity.room);
                }
                self.replay().await;
            }
            None => {}
        }
    }

    /// Emits every queued message in order and drops it from the offline store.
    async fn replay(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        tracing::info!(count = self.queue.len(), "sending queued messages");
        while let Some(queued) = self.queue.pop_front() {
            self.sink.emit(queued.to_event());
            if let Some(id) = queued.id {
                self.store.remove(id).await;
            }
        }
    }

    pub fn handle(&mut self, event: ServerEvent) {
        let Some(identity) = &self.identity else {
            return;
        };

        match event {
            ServerEvent::Message(message) => {
                if message.room != identity.room {
                    tracing::debug!(room = %message.room, "message for another room ignored");
                    return;
                }
                self.renderer.render(&message, false);
                if !message.is_system() && message.username != identity.username {
                    self.renderer.notify(&message);
                }
            }
            ServerEvent::LoadMessages(history) => {
                for message in history.iter().filter(|m| m.room == identity.room) {
                    self.renderer.render(message, false);
                }
            }
            ServerEvent::Typing { username } => {
                self.renderer.typing((!username.is_empty()).then_some(username.as_str()));
            }
            ServerEvent::ChatCleared { room } => {
                if room != identity.room {
                    return;
                }
                let notice = ChatMessage::system(room, "Chat has been cleared by another user");
                self.renderer.clear();
                self.renderer.render(&notice, false);
            }
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn connectivity(&self) -> Connectivity {
        self.monitor.state()
    }

    pub fn queued(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.queue.iter()
    }

    pub fn store(&self) -> &OfflineStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Sender name reserved for join/clear notices.
pub const SYSTEM_USERNAME: &str = "ChatBot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
    pub room: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, message: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
            room: room.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn system(room: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(SYSTEM_USERNAME, message, room)
    }

    pub fn is_system(&self) -> bool {
        self.username == SYSTEM_USERNAME
    }
}

/// Sent as one JSON text frame, `{"event": "joinRoom", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom { username: String, room: String },
    ChatMessage { username: String, message: String, room: String },
    Typing { username: String, room: String },
    ClearChat { room: String },
}

impl ClientEvent {
    /// Room the event is addressed to.
    pub fn room(&self) -> &str {
        match self {
            ClientEvent::JoinRoom { room, .. }
            | ClientEvent::ChatMessage { room, .. }
            | ClientEvent::Typing { room, .. }
            | ClientEvent::ClearChat { room } => room,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Message(ChatMessage),
    LoadMessages(Vec<ChatMessage>),
    /// An empty username means the sender stopped typing.
    Typing { username: String },
    ChatCleared { room: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_use_socket_event_names() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "chatMessage",
            "data": { "username": "A", "message": "hi", "room": "general" }
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::ChatMessage {
                username: "A".into(),
                message: "hi".into(),
                room: "general".into(),
            }
        );

        let join = serde_json::to_value(ClientEvent::JoinRoom {
            username: "A".into(),
            room: "tech".into(),
        })
        .unwrap();
        assert_eq!(join, json!({ "event": "joinRoom", "data": { "username": "A", "room": "tech" } }));
    }

    #[test]
    fn chat_message_ignores_client_extras() {
        // replayed offline messages used to carry id and timestamp
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "chatMessage",
            "data": {
                "id": 4,
                "username": "A",
                "message": "ping",
                "room": "general",
                "timestamp": "2024-01-01T00:00:00Z"
            }
        }))
        .unwrap();

        assert_eq!(event.room(), "general");
    }

    #[test]
    fn server_message_serializes_rfc3339_timestamp() {
        let msg = ChatMessage {
            username: "A".into(),
            message: "hi".into(),
            room: "general".into(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
        };

        let value = serde_json::to_value(ServerEvent::Message(msg.clone())).unwrap();
        assert_eq!(value["event"], "message");
        assert_eq!(value["data"]["timestamp"], "1970-01-01T00:00:00Z");

        let back: ServerEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, ServerEvent::Message(msg));
    }

    #[test]
    fn cleared_and_typing_payloads() {
        let cleared = serde_json::to_value(ServerEvent::ChatCleared { room: "tech".into() }).unwrap();
        assert_eq!(cleared, json!({ "event": "chatCleared", "data": { "room": "tech" } }));

        let typing = serde_json::to_value(ServerEvent::Typing { username: String::new() }).unwrap();
        assert_eq!(typing, json!({ "event": "typing", "data": { "username": "" } }));
    }

    #[test]
    fn system_messages_are_recognised() {
        assert!(ChatMessage::system("general", "hello").is_system());
        assert!(!ChatMessage::new("bob", "hello", "general").is_system());
    }
}

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use roomcast::{
    AppState,
    client::{
        Connectivity, OfflineStore, Renderer, Session,
        auth::{AuthClient, AuthError},
        channel,
    },
    config::Config,
    protocol::{ChatMessage, ClientEvent, ServerEvent},
    storage::{MemoryStore, Storage},
};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(Config::default(), Storage::in_memory(MemoryStore::new()));
    tokio::spawn(roomcast::serve(listener, state));
    addr
}

async fn open(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, event: ClientEvent) {
    let frame = serde_json::to_string(&event).unwrap();
    socket.send(Message::Text(frame)).await.unwrap();
}

async fn next_event(socket: &mut Socket) -> ServerEvent {
    loop {
        let frame = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Skips events until a chat message from a person arrives.
async fn next_chat(socket: &mut Socket) -> ChatMessage {
    loop {
        if let ServerEvent::Message(message) = next_event(socket).await {
            if !message.is_system() {
                return message;
            }
        }
    }
}

async fn join(socket: &mut Socket, username: &str, room: &str) -> Vec<ChatMessage> {
    send(socket, ClientEvent::JoinRoom { username: username.into(), room: room.into() }).await;
    loop {
        if let ServerEvent::LoadMessages(history) = next_event(socket).await {
            return history;
        }
    }
}

#[tokio::test]
async fn messages_reach_everyone_in_the_room() {
    let addr = start_server().await;
    let mut alice = open(addr).await;
    let mut bob = open(addr).await;
    let mut carol = open(addr).await;

    join(&mut alice, "alice", "general").await;
    join(&mut bob, "bob", "general").await;
    join(&mut carol, "carol", "random").await;

    match next_event(&mut alice).await {
        ServerEvent::Message(notice) => assert_eq!(notice.message, "bob has joined the chat"),
        other => panic!("unexpected {other:?}"),
    }

    send(&mut alice, ClientEvent::ChatMessage {
        username: "alice".into(),
        message: "hi".into(),
        room: "general".into(),
    })
    .await;

    let received = next_chat(&mut bob).await;
    assert_eq!((received.username.as_str(), received.message.as_str()), ("alice", "hi"));
    assert_eq!(next_chat(&mut alice).await.message, "hi");

    send(&mut carol, ClientEvent::ChatMessage {
        username: "carol".into(),
        message: "elsewhere".into(),
        room: "random".into(),
    })
    .await;
    assert_eq!(next_chat(&mut carol).await.message, "elsewhere");

    // a later joiner gets the room's history, and only that room's
    let mut dave = open(addr).await;
    let history = join(&mut dave, "dave", "general").await;
    let texts: Vec<&str> = history.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, ["hi"]);
}

#[tokio::test]
async fn clear_chat_empties_history_and_tells_the_others() {
    let addr = start_server().await;
    let mut alice = open(addr).await;
    let mut bob = open(addr).await;

    join(&mut alice, "alice", "general").await;
    join(&mut bob, "bob", "general").await;
    send(&mut bob, ClientEvent::ChatMessage {
        username: "bob".into(),
        message: "soon gone".into(),
        room: "general".into(),
    })
    .await;
    assert_eq!(next_chat(&mut bob).await.message, "soon gone");

    send(&mut bob, ClientEvent::ClearChat { room: "general".into() }).await;
    loop {
        if let ServerEvent::ChatCleared { room } = next_event(&mut alice).await {
            assert_eq!(room, "general");
            break;
        }
    }

    let mut carol = open(addr).await;
    assert!(join(&mut carol, "carol", "general").await.is_empty());
}

#[tokio::test]
async fn accounts_over_http() {
    let addr = start_server().await;
    let client = AuthClient::new(format!("http://{addr}"));

    client.register("bob", "secret").await.unwrap();
    match client.register("bob", "other").await {
        Err(AuthError::Rejected(reason)) => assert_eq!(reason, "Username already exists"),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(client.login("bob", "secret").await.unwrap(), "bob");
    match client.login("bob", "wrong").await {
        Err(AuthError::Rejected(reason)) => assert_eq!(reason, "Invalid credentials"),
        other => panic!("unexpected {other:?}"),
    }

    let status = client.status().await.unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(status.mode, "in-memory");
}

#[derive(Default)]
struct Quiet;

impl Renderer for Quiet {
    fn render(&mut self, _message: &ChatMessage, _offline: bool) {}
    fn clear(&mut self) {}
    fn typing(&mut self, _username: Option<&str>) {}
}

#[tokio::test]
async fn offline_messages_are_replayed_in_order_once_connected() {
    let addr = start_server().await;
    let mut observer = open(addr).await;
    join(&mut observer, "observer", "general").await;

    let dir = tempfile::tempdir().unwrap();
    let store = OfflineStore::open(&format!("sqlite://{}/offline.db?mode=rwc", dir.path().display())).await;

    let mut channel = channel::spawn(format!("ws://{addr}/ws"), Duration::from_millis(50));
    let mut session = Session::new(channel.handle.clone(), Quiet, store, Connectivity::Offline);
    session.join("alice", "general");
    session.send("ping").await;
    session.send("pong").await;
    assert_eq!(session.queued().count(), 2);

    timeout(WAIT, channel.link.wait_for(|link| link.connectivity == Connectivity::Online))
        .await
        .unwrap()
        .unwrap();
    session.set_connectivity(Connectivity::Online).await;

    assert_eq!(next_chat(&mut observer).await.message, "ping");
    assert_eq!(next_chat(&mut observer).await.message, "pong");
    assert!(session.store().load_all().await.is_empty());
}

use crate::{
    AppResult, AppState,
    protocol::{ChatMessage, ClientEvent, ServerEvent},
};

use super::registry::ConnId;

/// Handles one inbound event. Failures are logged and the event's remaining
/// side effects are skipped; nothing is reported back to the client.
pub async fn dispatch(state: &AppState, conn: ConnId, event: ClientEvent) {
    if !state.config.room_allowed(event.room()) {
        tracing::warn!(%conn, room = event.room(), "event for unknown room dropped");
        return;
    }

    let result = match event {
        ClientEvent::JoinRoom { username, room } => join_room(state, conn, username, room).await,
        ClientEvent::ChatMessage { username, message, room } => {
            chat_message(state, username, message, room).await
        }
        ClientEvent::ClearChat { room } => clear_chat(state, conn, room).await,
        ClientEvent::Typing { username, room } => typing(state, conn, username, room),
    };

    if let Err(err) = result {
        tracing::error!(%conn, error = ?err.0, "failed to handle event");
    }
}

async fn join_room(state: &AppState, conn: ConnId, username: String, room: String) -> AppResult<()> {
    let left = state.rooms.join(conn, &room);
    tracing::info!(%conn, %username, %room, ?left, "joined room");

    state.rooms.send_to(
        conn,
        &ServerEvent::Message(ChatMessage::system(&room, format!("Welcome to the {room} chat room!"))),
    )?;
    state.rooms.broadcast(
        &room,
        &ServerEvent::Message(ChatMessage::system(&room, format!("{username} has joined the chat"))),
        Some(conn),
    )?;

    let history = state.messages.find_recent(&room, state.config.history_limit).await?;
    state.rooms.send_to(conn, &ServerEvent::LoadMessages(history))?;
    Ok(())
}

async fn chat_message(state: &AppState, username: String, message: String, room: String) -> AppResult<()> {
    if message.trim().is_empty() {
        tracing::debug!(%username, %room, "empty chat message ignored");
        return Ok(());
    }

    let message = ChatMessage::new(username, message, room);
    state.messages.append(&message).await?;

    let delivered = state.rooms.broadcast(&message.room, &ServerEvent::Message(message.clone()), None)?;
    tracing::debug!(room = %message.room, delivered, "chat message broadcast");
    Ok(())
}

async fn clear_chat(state: &AppState, conn: ConnId, room: String) -> AppResult<()> {
    state.messages.delete_all(&room).await?;
    tracing::info!(%conn, %room, "chat cleared");

    state.rooms.broadcast(&room, &ServerEvent::ChatCleared { room: room.clone() }, Some(conn))?;
    Ok(())
}

fn typing(state: &AppState, conn: ConnId, username: String, room: String) -> AppResult<()> {
    state.rooms.broadcast(&room, &ServerEvent::Typing { username }, Some(conn))?;
    Ok(())
}

use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::{AppState, protocol::ClientEvent};

use super::events;

#[debug_handler]
pub async fn room_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |stream| serve_connection(state, stream))
}

async fn serve_connection(state: AppState, stream: WebSocket) {
    let (conn, mut rx) = state.rooms.connect();
    let (mut sender, mut receiver) = stream.split();
    tracing::info!(%conn, "user connected");

    let mut forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(Ok(msg)) = msg else {
                    break;
                };
                if let Message::Close(_) = msg {
                    break;
                }
                let data = msg.into_data();
                if data.is_empty() {
                    continue;
                }
                let event: ClientEvent = match serde_json::from_slice(&data) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::debug!(%conn, %err, "skipping malformed frame");
                        continue;
                    }
                };
                events::dispatch(&state, conn, event).await;
            }
            _ = &mut forward_task => break,
        }
    }

    state.rooms.disconnect(conn);
    forward_task.abort();
    tracing::info!(%conn, "user disconnected");
}

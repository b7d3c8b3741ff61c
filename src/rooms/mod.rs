pub mod events;
pub mod registry;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use registry::{ConnId, RoomRegistry};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::room_ws))
}

use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};

use crate::storage::StorageMode;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerStatus {
    pub status: String,
    pub mode: String,
}

#[debug_handler(state = crate::AppState)]
pub async fn status(State(mode): State<StorageMode>) -> Json<ServerStatus> {
    Json(ServerStatus {
        status: "ok".to_owned(),
        mode: mode.as_str().to_owned(),
    })
}

use axum::{debug_handler, http::StatusCode, response::Response};
use tower_sessions::Session;

use crate::AppResult;

use super::{USERNAME, notice};

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<Response> {
    if let Some(username) = session.get::<String>(USERNAME).await? {
        tracing::info!(%username, "logged out");
    }
    session.clear().await;
    Ok(notice(StatusCode::OK, "Logged out"))
}

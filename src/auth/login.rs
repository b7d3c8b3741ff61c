use std::sync::Arc;

use axum::{Json, debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{AppResult, storage::UserStore};

use super::{AuthError, Credentials, USERNAME, notice, verify_login};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(users): State<Arc<dyn UserStore>>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> AppResult<Response> {
    tracing::debug!(username = %credentials.username, "login attempt");

    let username = match verify_login(&users, &credentials).await {
        Ok(username) => username,
        Err(AuthError::InvalidCredentials) => {
            return Ok(notice(StatusCode::BAD_REQUEST, AuthError::InvalidCredentials.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    session.insert(USERNAME, &username).await?;
    tracing::info!(%username, "login successful");

    Ok(Json(LoginResponse {
        message: "Login successful".to_owned(),
        username,
    })
    .into_response())
}

use std::sync::Arc;

use axum::{Json, debug_handler, extract::State, http::StatusCode, response::Response};

use crate::{AppResult, storage::UserStore};

use super::{AuthError, Credentials, notice, register_user};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn register(
    State(users): State<Arc<dyn UserStore>>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Response> {
    match register_user(&users, &credentials).await {
        Ok(()) => Ok(notice(StatusCode::CREATED, "User registered successfully")),
        Err(err @ (AuthError::MissingFields | AuthError::UsernameTaken)) => {
            Ok(notice(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

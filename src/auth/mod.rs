pub mod password;

mod login;
mod logout;
mod register;

use std::sync::Arc;

use axum::{Json, Router, http::StatusCode, response::{IntoResponse, Response}, routing::post};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState,
    storage::{StorageError, UserRecord, UserStore},
};

pub const USERNAME: &str = "username";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `{ "message": ... }` body used by every auth response.
#[derive(Debug, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

pub(crate) fn notice(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(Notice { message: message.into() })).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter both username and password")]
    MissingFields,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate(_) => AuthError::UsernameTaken,
            other => AuthError::Storage(other),
        }
    }
}

pub async fn register_user(users: &Arc<dyn UserStore>, credentials: &Credentials) -> Result<(), AuthError> {
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.is_empty() {
        return Err(AuthError::MissingFields);
    }

    users
        .create(&UserRecord {
            username: username.to_owned(),
            password_hash: password::hash(&credentials.password),
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    tracing::info!(username, "registered user");
    Ok(())
}

/// Returns the canonical username on success.
pub async fn verify_login(users: &Arc<dyn UserStore>, credentials: &Credentials) -> Result<String, AuthError> {
    let username = credentials.username.trim();
    let Some(user) = users.find(username).await? else {
        tracing::info!(username, "login for unknown user");
        return Err(AuthError::InvalidCredentials);
    };

    if !password::verify(&credentials.password, &user.password_hash) {
        tracing::info!(username, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    Ok(user.username)
}

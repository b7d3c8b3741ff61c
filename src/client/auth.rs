use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{
    auth::{Credentials, Notice},
    status::ServerStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server refused the request and said why.
    #[error("{0}")]
    Rejected(String),
    #[error("unexpected response status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, serde::Deserialize)]
struct LoginBody {
    username: String,
}

/// HTTP client for the account endpoints under `/api`.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> AuthClient {
        AuthClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// `ws://` URL of the message channel on the same server.
    pub fn channel_url(&self) -> String {
        let url = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{url}/ws")
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.post::<Notice>("register", username, password, StatusCode::CREATED)
            .await
            .map(drop)
    }

    /// Returns the username the server logged in.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let body: LoginBody = self.post("login", username, password, StatusCode::OK).await?;
        Ok(body.username)
    }

    pub async fn status(&self) -> Result<ServerStatus, AuthError> {
        let response = self.http.get(format!("{}/api/status", self.base_url)).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        username: &str,
        password: &str,
        expected: StatusCode,
    ) -> Result<T, AuthError> {
        let response = self
            .http
            .post(format!("{}/api/{path}", self.base_url))
            .json(&Credentials {
                username: username.to_owned(),
                password: password.to_owned(),
            })
            .send()
            .await?;

        match response.status() {
            status if status == expected => Ok(response.json().await?),
            StatusCode::BAD_REQUEST => {
                let notice: Notice = response.json().await?;
                Err(AuthError::Rejected(notice.message))
            }
            status => Err(AuthError::Status(status)),
        }
    }
}

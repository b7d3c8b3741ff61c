pub mod appresult;
pub mod auth;
pub mod client;
pub mod config;
pub mod protocol;
pub mod rooms;
pub mod status;
pub mod storage;

use std::sync::Arc;

use axum::{Router, extract::FromRef, routing::get};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

pub use appresult::{AppError, AppResult};

use config::Config;
use rooms::RoomRegistry;
use storage::{MessageStore, Storage, StorageMode, UserStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserStore>,
    pub mode: StorageMode,
    pub rooms: Arc<RoomRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, storage: Storage) -> AppState {
        AppState {
            messages: storage.messages,
            users: storage.users,
            mode: storage.mode,
            rooms: Arc::new(RoomRegistry::new(config.membership)),
            config: Arc::new(config),
        }
    }
}

pub fn app(app_state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(app_state.config.session_idle));

    Router::new()
        .nest(
            "/api",
            auth::router().route("/status", get(status::status)),
        )
        .merge(rooms::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(listener: TcpListener, app_state: AppState) -> anyhow::Result<()> {
    tracing::info!(
        addr = %listener.local_addr()?,
        mode = app_state.mode.as_str(),
        "server listening"
    );
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}

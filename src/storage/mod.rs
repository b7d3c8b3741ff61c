mod error;
mod memory;
mod sqlite;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{config::Config, protocol::ChatMessage};

pub use error::{StorageError, StorageResult};
pub use memory::{DEMO_PASSWORD, DEMO_USERNAME, MemoryStore};
pub use sqlite::SqliteStore;
pub(crate) use sqlite::{from_millis, to_millis};

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The most recent `limit` messages of `room`, oldest first.
    async fn find_recent(&self, room: &str, limit: usize) -> StorageResult<Vec<ChatMessage>>;

    async fn append(&self, message: &ChatMessage) -> StorageResult<()>;

    async fn delete_all(&self, room: &str) -> StorageResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, username: &str) -> StorageResult<Option<UserRecord>>;

    /// Fails with [`StorageError::Duplicate`] when the username is taken.
    async fn create(&self, user: &UserRecord) -> StorageResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Durable,
    InMemory,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Durable => "durable",
            StorageMode::InMemory => "in-memory",
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserStore>,
    pub mode: StorageMode,
}

impl Storage {
    pub fn durable(store: SqliteStore) -> Storage {
        let store = Arc::new(store);
        Storage {
            messages: store.clone(),
            users: store,
            mode: StorageMode::Durable,
        }
    }

    pub fn in_memory(store: MemoryStore) -> Storage {
        let store = Arc::new(store);
        Storage {
            messages: store.clone(),
            users: store,
            mode: StorageMode::InMemory,
        }
    }
}

/// Connects the durable backend, falling back to memory if it is not configured
/// or does not come up within `config.db_connect_timeout`.
pub async fn connect(config: &Config) -> Storage {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory storage");
        return Storage::in_memory(MemoryStore::with_demo_data());
    };

    choose(config.db_connect_timeout, SqliteStore::connect(url)).await
}

async fn choose(
    timeout: Duration,
    connecting: impl Future<Output = StorageResult<SqliteStore>>,
) -> Storage {
    match tokio::time::timeout(timeout, connecting).await {
        Ok(Ok(store)) => {
            tracing::info!("connected to database");
            Storage::durable(store)
        }
        Ok(Err(err)) => {
            tracing::error!(%err, "database connection failed, using in-memory storage");
            Storage::in_memory(MemoryStore::with_demo_data())
        }
        Err(_) => {
            tracing::error!(?timeout, "database connection timed out, using in-memory storage");
            Storage::in_memory(MemoryStore::with_demo_data())
        }
    }
}

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::storage::{StorageResult, from_millis, to_millis};

use super::QueuedMessage;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS offline_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    message TEXT NOT NULL,
    room TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL
)";

#[derive(Debug, Clone, Default)]
pub struct OfflineStore {
    db_pool: Option<SqlitePool>,
}

impl OfflineStore {
    pub async fn open(url: &str) -> OfflineStore {
        let options = SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None);
        match Self::init(options, url).await {
            Ok(db_pool) => OfflineStore { db_pool: Some(db_pool) },
            Err(err) => {
                tracing::warn!(url, %err, "offline store unavailable, queued messages will not survive a restart");
                OfflineStore::unavailable()
            }
        }
    }

    async fn init(options: SqlitePoolOptions, url: &str) -> StorageResult<SqlitePool> {
        let db_pool = options.connect(url).await?;
        sqlx::query(SCHEMA).execute(&db_pool).await?;
        Ok(db_pool)
    }

    pub fn unavailable() -> OfflineStore {
        OfflineStore { db_pool: None }
    }

    pub fn is_available(&self) -> bool {
        self.db_pool.is_some()
    }

    /// Persists `message` and returns its new id.
    pub async fn save(&self, message: &QueuedMessage) -> Option<i64> {
        let db_pool = self.db_pool.as_ref()?;
        let result = sqlx::query(
            "INSERT INTO offline_messages (username,message,room,timestamp_ms) VALUES (?,?,?,?)",
        )
        .bind(&message.username)
        .bind(&message.message)
        .bind(&message.room)
        .bind(to_millis(message.timestamp))
        .execute(db_pool)
        .await;

        match result {
            Ok(done) => Some(done.last_insert_rowid()),
            Err(err) => {
                tracing::warn!(%err, "failed to save offline message");
                None
            }
        }
    }

    pub async fn remove(&self, id: i64) {
        let Some(db_pool) = &self.db_pool else {
            return;
        };
        if let Err(err) = sqlx::query("DELETE FROM offline_messages WHERE id=?")
            .bind(id)
            .execute(db_pool)
            .await
        {
            tracing::warn!(id, %err, "failed to remove offline message");
        }
    }

    /// Every stored message, oldest first.
    pub async fn load_all(&self) -> Vec<QueuedMessage> {
        let Some(db_pool) = &self.db_pool else {
            return Vec::new();
        };
        match Self::fetch_all(db_pool).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(%err, "failed to load offline messages");
                Vec::new()
            }
        }
    }

    async fn fetch_all(db_pool: &SqlitePool) -> StorageResult<Vec<QueuedMessage>> {
        let rows: Vec<(i64, String, String, String, i64)> = sqlx::query_as(
            "SELECT id,username,message,room,timestamp_ms FROM offline_messages ORDER BY id",
        )
        .fetch_all(db_pool)
        .await?;

        rows.into_iter()
            .map(|(id, username, message, room, timestamp_ms)| {
                Ok(QueuedMessage {
                    id: Some(id),
                    username,
                    message,
                    room,
                    timestamp: from_millis(timestamp_ms)?,
                })
            })
            .collect()
    }
}

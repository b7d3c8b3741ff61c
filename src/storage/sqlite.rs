use async_trait::async_trait;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::protocol::ChatMessage;

use super::{MessageStore, StorageError, StorageResult, UserRecord, UserStore};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        room TEXT NOT NULL,
        username TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp_ms INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_room_time ON messages (room, timestamp_ms)",
    "CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL
    )",
];

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> StorageResult<SqliteStore> {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;
        Self::from_pool(db_pool).await
    }

    pub async fn from_pool(db_pool: SqlitePool) -> StorageResult<SqliteStore> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&db_pool).await?;
        }
        Ok(SqliteStore { db_pool })
    }
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(ms: i64) -> StorageResult<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)?)
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn find_recent(&self, room: &str, limit: usize) -> StorageResult<Vec<ChatMessage>> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            "SELECT room,username,message,timestamp_ms FROM messages
             WHERE room=? ORDER BY timestamp_ms DESC, rowid DESC LIMIT ?",
        )
        .bind(room)
        .bind(limit as i64)
        .fetch_all(&self.db_pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(|(room, username, message, timestamp_ms)| {
                Ok(ChatMessage {
                    username,
                    message,
                    room,
                    timestamp: from_millis(timestamp_ms)?,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn append(&self, message: &ChatMessage) -> StorageResult<()> {
        sqlx::query("INSERT INTO messages (id,room,username,message,timestamp_ms) VALUES (?,?,?,?,?)")
            .bind(Uuid::now_v7().to_string())
            .bind(&message.room)
            .bind(&message.username)
            .bind(&message.message)
            .bind(to_millis(message.timestamp))
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    async fn delete_all(&self, room: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE room=?")
            .bind(room)
            .execute(&self.db_pool)
            .await?;
        tracing::debug!(room, deleted = result.rows_affected(), "cleared room history");
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn find(&self, username: &str) -> StorageResult<Option<UserRecord>> {
        let row: Option<(String, String, i64)> =
            sqlx::query_as("SELECT username,password_hash,created_at_ms FROM users WHERE username=?")
                .bind(username)
                .fetch_optional(&self.db_pool)
                .await?;

        row.map(|(username, password_hash, created_at_ms)| {
            Ok(UserRecord {
                username,
                password_hash,
                created_at: from_millis(created_at_ms)?,
            })
        })
        .transpose()
    }

    async fn create(&self, user: &UserRecord) -> StorageResult<()> {
        let result = sqlx::query("INSERT INTO users (username,password_hash,created_at_ms) VALUES (?,?,?)")
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(to_millis(user.created_at))
            .execute(&self.db_pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StorageError::Duplicate(user.username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/chat.db?mode=rwc", dir.path().display());
        let store = SqliteStore::connect(&url).await.unwrap();
        (dir, store)
    }

    fn at(room: &str, text: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            username: "alice".into(),
            message: text.into(),
            room: room.into(),
            timestamp: OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs),
        }
    }

    #[tokio::test]
    async fn find_recent_returns_latest_oldest_first() {
        let (_dir, store) = store().await;
        for i in 0..55 {
            store.append(&at("general", &format!("m{i}"), i)).await.unwrap();
        }
        store.append(&at("tech", "elsewhere", 1000)).await.unwrap();

        let recent = store.find_recent("general", 50).await.unwrap();
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].message, "m5");
        assert_eq!(recent[49].message, "m54");
        assert!(recent.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn timestamps_survive_a_round_trip_to_millisecond_precision() {
        let (_dir, store) = store().await;
        let mut sent = at("general", "hi", 1_700_000_000);
        sent.timestamp += Duration::milliseconds(123);
        store.append(&sent).await.unwrap();

        let loaded = store.find_recent("general", 1).await.unwrap();
        assert_eq!(loaded, vec![sent]);
    }

    #[tokio::test]
    async fn delete_all_is_room_scoped() {
        let (_dir, store) = store().await;
        store.append(&at("general", "a", 1)).await.unwrap();
        store.append(&at("tech", "b", 1)).await.unwrap();

        store.delete_all("tech").await.unwrap();

        assert_eq!(store.find_recent("general", 50).await.unwrap().len(), 1);
        assert!(store.find_recent("tech", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let (_dir, store) = store().await;
        let bob = UserRecord {
            username: "bob".into(),
            password_hash: "salt$digest".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        store.create(&bob).await.unwrap();
        assert!(matches!(store.create(&bob).await, Err(StorageError::Duplicate(_))));
        assert_eq!(store.find("bob").await.unwrap(), Some(bob));
        assert_eq!(store.find("nobody").await.unwrap(), None);
    }
}

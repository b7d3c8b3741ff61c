use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{auth::password, protocol::ChatMessage};

use super::{MessageStore, StorageError, StorageResult, UserRecord, UserStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<ChatMessage>>,
    users: Mutex<Vec<UserRecord>>,
}

pub const DEMO_USERNAME: &str = "test";
pub const DEMO_PASSWORD: &str = "password";

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Fallback store seeded with a demo account and a welcome message.
    pub fn with_demo_data() -> MemoryStore {
        let store = MemoryStore::new();

        lock(&store.users).push(UserRecord {
            username: DEMO_USERNAME.to_owned(),
            password_hash: password::hash(DEMO_PASSWORD),
            created_at: OffsetDateTime::now_utc(),
        });
        lock(&store.messages).push(ChatMessage::system("general", "Welcome to the in-memory chat!"));

        tracing::info!(
            username = DEMO_USERNAME,
            password = DEMO_PASSWORD,
            "in-memory storage seeded with a demo account"
        );
        store
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn find_recent(&self, room: &str, limit: usize) -> StorageResult<Vec<ChatMessage>> {
        let mut found: Vec<ChatMessage> = lock(&self.messages)
            .iter()
            .filter(|msg| msg.room == room)
            .cloned()
            .collect();

        // stable, so equal timestamps keep insertion order
        found.sort_by_key(|msg| msg.timestamp);
        let skip = found.len().saturating_sub(limit);
        Ok(found.split_off(skip))
    }

    async fn append(&self, message: &ChatMessage) -> StorageResult<()> {
        lock(&self.messages).push(message.clone());
        Ok(())
    }

    async fn delete_all(&self, room: &str) -> StorageResult<()> {
        lock(&self.messages).retain(|msg| msg.room != room);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find(&self, username: &str) -> StorageResult<Option<UserRecord>> {
        Ok(lock(&self.users)
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create(&self, user: &UserRecord) -> StorageResult<()> {
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.username == user.username) {
            return Err(StorageError::Duplicate(user.username.clone()));
        }
        users.push(user.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn at(room: &str, text: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            username: "alice".into(),
            message: text.into(),
            room: room.into(),
            timestamp: OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs),
        }
    }

    #[tokio::test]
    async fn find_recent_keeps_latest_in_ascending_order() {
        let store = MemoryStore::new();
        for i in (0..60).rev() {
            store.append(&at("general", &format!("m{i}"), i)).await.unwrap();
        }
        store.append(&at("tech", "other room", 100)).await.unwrap();

        let recent = store.find_recent("general", 50).await.unwrap();
        assert_eq!(recent.len(), 50);
        assert_eq!(recent.first().unwrap().message, "m10");
        assert_eq!(recent.last().unwrap().message, "m59");
        assert!(recent.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(recent.iter().all(|m| m.room == "general"));
    }

    #[tokio::test]
    async fn delete_all_only_touches_one_room() {
        let store = MemoryStore::new();
        store.append(&at("general", "a", 1)).await.unwrap();
        store.append(&at("tech", "b", 2)).await.unwrap();

        store.delete_all("general").await.unwrap();

        assert!(store.find_recent("general", 50).await.unwrap().is_empty());
        assert_eq!(store.find_recent("tech", 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_users_are_rejected() {
        let store = MemoryStore::new();
        let bob = UserRecord {
            username: "bob".into(),
            password_hash: "x".into(),
            created_at: OffsetDateTime::now_utc(),
        };

        store.create(&bob).await.unwrap();
        assert!(matches!(store.create(&bob).await, Err(StorageError::Duplicate(name)) if name == "bob"));
    }

    #[tokio::test]
    async fn demo_data_has_login_and_welcome() {
        let store = MemoryStore::with_demo_data();

        let user = store.find(DEMO_USERNAME).await.unwrap().unwrap();
        assert!(password::verify(DEMO_PASSWORD, &user.password_hash));

        let general = store.find_recent("general", 50).await.unwrap();
        assert_eq!(general.len(), 1);
        assert!(general[0].is_system());
    }
}

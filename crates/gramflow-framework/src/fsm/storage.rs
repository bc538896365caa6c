use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::StorageResult;

/// The destiny of the primary FSM record.
pub const DEFAULT_DESTINY: &str = "default";

/// Free-form data stored next to a state.
pub type StorageData = Map<String, Value>;

/// Identifies one FSM record.
///
/// `destiny` separates independent records of the same conversation, for
/// example scene history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub bot_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub thread_id: Option<i64>,
    pub business_connection_id: Option<String>,
    pub destiny: String,
}

impl StorageKey {
    pub fn new(bot_id: i64, chat_id: i64, user_id: i64) -> Self {
        Self {
            bot_id,
            chat_id,
            user_id,
            thread_id: None,
            business_connection_id: None,
            destiny: DEFAULT_DESTINY.to_string(),
        }
    }

    pub fn with_thread_id(mut self, thread_id: Option<i64>) -> Self {
        self.thread_id = thread_id;
        self
    }

    /// The same conversation under another destiny.
    pub fn with_destiny(&self, destiny: impl Into<String>) -> Self {
        Self {
            destiny: destiny.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.bot_id, self.chat_id, self.user_id)?;
        if let Some(thread_id) = self.thread_id {
            write!(f, ":{thread_id}")?;
        }
        if let Some(id) = &self.business_connection_id {
            write!(f, ":{id}")?;
        }
        write!(f, ":{}", self.destiny)
    }
}

/// Persistence of FSM states and data.
#[async_trait]
pub trait BaseStorage: Send + Sync + 'static {
    async fn set_state(&self, key: &StorageKey, state: Option<String>) -> StorageResult<()>;

    async fn get_state(&self, key: &StorageKey) -> StorageResult<Option<String>>;

    async fn set_data(&self, key: &StorageKey, data: StorageData) -> StorageResult<()>;

    async fn get_data(&self, key: &StorageKey) -> StorageResult<StorageData>;

    /// Merges `patch` into the stored data and returns the result.
    async fn update_data(&self, key: &StorageKey, patch: StorageData) -> StorageResult<StorageData> {
        let mut data = self.get_data(key).await?;
        data.extend(patch);
        self.set_data(key, data.clone()).await?;
        Ok(data)
    }

    async fn get_value(&self, key: &StorageKey, name: &str) -> StorageResult<Option<Value>> {
        Ok(self.get_data(key).await?.remove(name))
    }

    /// Releases backend resources.
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Record {
    state: Option<String>,
    data: StorageData,
}

/// Process-local storage. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<StorageKey, Record>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseStorage for MemoryStorage {
    async fn set_state(&self, key: &StorageKey, state: Option<String>) -> StorageResult<()> {
        self.records.lock().entry(key.clone()).or_default().state = state;
        Ok(())
    }

    async fn get_state(&self, key: &StorageKey) -> StorageResult<Option<String>> {
        Ok(self
            .records
            .lock()
            .get(key)
            .and_then(|r| r.state.clone()))
    }

    async fn set_data(&self, key: &StorageKey, data: StorageData) -> StorageResult<()> {
        self.records.lock().entry(key.clone()).or_default().data = data;
        Ok(())
    }

    async fn get_data(&self, key: &StorageKey) -> StorageResult<StorageData> {
        Ok(self
            .records
            .lock()
            .get(key)
            .map(|r| r.data.clone())
            .unwrap_or_default())
    }

    async fn close(&self) -> StorageResult<()> {
        self.records.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new(1, 2, 3);
        assert_eq!(storage.get_state(&key).await.unwrap(), None);

        storage.set_state(&key, Some("Form:name".into())).await.unwrap();
        storage
            .update_data(&key, json!({"a": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let merged = storage
            .update_data(&key, json!({"b": 2}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 2}));
        assert_eq!(storage.get_value(&key, "b").await.unwrap(), Some(json!(2)));
        assert_eq!(
            storage.get_state(&key).await.unwrap().as_deref(),
            Some("Form:name")
        );
    }

    #[tokio::test]
    async fn test_destinies_are_separate() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new(1, 2, 3);
        let history = key.with_destiny("scenes_history");
        storage.set_state(&key, Some("A".into())).await.unwrap();
        assert_eq!(storage.get_state(&history).await.unwrap(), None);
        assert_eq!(history.to_string(), "1:2:3:scenes_history");
    }
}

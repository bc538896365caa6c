use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::state::State;
use super::storage::{BaseStorage, StorageData, StorageKey};
use crate::error::{StorageError, StorageResult};

/// FSM handle of one conversation, injected as `state`.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct FsmContext {
    storage: Arc<dyn BaseStorage>,
    key: StorageKey,
}

impl fmt::Debug for FsmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmContext").field("key", &self.key).finish_non_exhaustive()
    }
}

impl FsmContext {
    pub fn new(storage: Arc<dyn BaseStorage>, key: StorageKey) -> Self {
        Self { storage, key }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn storage(&self) -> &Arc<dyn BaseStorage> {
        &self.storage
    }

    /// The same conversation under another destiny.
    pub fn with_destiny(&self, destiny: &str) -> Self {
        Self {
            storage: self.storage.clone(),
            key: self.key.with_destiny(destiny),
        }
    }

    pub async fn set_state(&self, state: &State) -> StorageResult<()> {
        self.set_raw_state(Some(state.name().to_string())).await
    }

    pub async fn set_raw_state(&self, state: Option<String>) -> StorageResult<()> {
        self.storage.set_state(&self.key, state).await
    }

    pub async fn clear_state(&self) -> StorageResult<()> {
        self.set_raw_state(None).await
    }

    pub async fn get_state(&self) -> StorageResult<Option<String>> {
        self.storage.get_state(&self.key).await
    }

    pub async fn set_data(&self, data: StorageData) -> StorageResult<()> {
        self.storage.set_data(&self.key, data).await
    }

    pub async fn get_data(&self) -> StorageResult<StorageData> {
        self.storage.get_data(&self.key).await
    }

    /// Merges `patch` into the data and returns the result.
    pub async fn update_data(&self, patch: StorageData) -> StorageResult<StorageData> {
        self.storage.update_data(&self.key, patch).await
    }

    /// Reads one data entry as `T`.
    pub async fn get_value<T: DeserializeOwned>(&self, name: &str) -> StorageResult<Option<T>> {
        match self.storage.get_value(&self.key, name).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
        }
    }

    /// Clears both the state and the data.
    pub async fn clear(&self) -> StorageResult<()> {
        self.clear_state().await?;
        self.set_data(StorageData::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{MemoryStorage, StatesGroup};
    use serde_json::json;

    fn context() -> FsmContext {
        FsmContext::new(Arc::new(MemoryStorage::new()), StorageKey::new(1, 2, 3))
    }

    #[tokio::test]
    async fn test_state_and_typed_values() {
        let ctx = context();
        let form = StatesGroup::new("Form");
        ctx.set_state(&form.state("age")).await.unwrap();
        ctx.update_data(json!({"age": 30}).as_object().cloned().unwrap())
            .await
            .unwrap();

        assert_eq!(ctx.get_state().await.unwrap().as_deref(), Some("Form:age"));
        assert_eq!(ctx.get_value::<u32>("age").await.unwrap(), Some(30));
        assert!(ctx.get_value::<String>("age").await.is_err());

        ctx.clear().await.unwrap();
        assert_eq!(ctx.get_state().await.unwrap(), None);
        assert!(ctx.get_data().await.unwrap().is_empty());
    }
}

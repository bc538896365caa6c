use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::{StorageError, StorageResult};
use crate::fsm::{FsmContext, StorageData};

/// FSM destiny holding the scene history.
pub const HISTORY_DESTINY: &str = "scenes_history";

/// Default number of entries kept.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

const HISTORY_FIELD: &str = "history";

/// A previously active scene and its data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub state: Option<String>,
    #[serde(default)]
    pub data: StorageData,
}

/// Bounded stack of previous scenes, persisted next to the FSM state.
///
/// When full, pushing drops the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    state: FsmContext,
    size: usize,
}

impl HistoryManager {
    /// History of the conversation of `state`.
    pub fn new(state: &FsmContext) -> Self {
        Self {
            state: state.with_destiny(HISTORY_DESTINY),
            size: DEFAULT_HISTORY_SIZE,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size.max(1);
        self
    }

    pub async fn push(&self, state: Option<String>, data: StorageData) -> StorageResult<()> {
        self.push_entry(HistoryEntry { state, data }).await
    }

    pub async fn push_entry(&self, entry: HistoryEntry) -> StorageResult<()> {
        let mut history = self.all().await?;
        trace!(state = ?entry.state, depth = history.len() + 1, "Pushing scene history");
        history.push(entry);
        if history.len() > self.size {
            let excess = history.len() - self.size;
            history.drain(..excess);
        }
        self.store(history).await
    }

    /// Removes and returns the most recent entry.
    pub async fn pop(&self) -> StorageResult<Option<HistoryEntry>> {
        let mut history = self.all().await?;
        let entry = history.pop();
        if entry.is_some() {
            self.store(history).await?;
        }
        Ok(entry)
    }

    /// The most recent entry.
    pub async fn get(&self) -> StorageResult<Option<HistoryEntry>> {
        Ok(self.all().await?.pop())
    }

    /// All entries, oldest first.
    pub async fn all(&self) -> StorageResult<Vec<HistoryEntry>> {
        match self.state.get_data().await?.remove(HISTORY_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StorageError::Serialization(e.to_string())),
        }
    }

    pub async fn clear(&self) -> StorageResult<()> {
        self.state.set_data(StorageData::new()).await
    }

    async fn store(&self, history: Vec<HistoryEntry>) -> StorageResult<()> {
        let value =
            serde_json::to_value(history).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut data = StorageData::new();
        data.insert(HISTORY_FIELD.to_string(), value);
        self.state.set_data(data).await
    }
}

//! Request-scoped context data.
//!
//! Every update carries one [`Data`] map through the router tree. Middleware
//! and filters add entries to it, handlers request entries from it through
//! extractors. Because the map travels with the call chain, concurrently
//! dispatched updates never observe each other's values.
//!
//! Well-known keys are listed in [`keys`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased context value.
pub type DataValue = Arc<dyn Any + Send + Sync>;

/// Keys the framework itself reads or writes.
pub mod keys {
    /// [`Bot`](gramflow_core::Bot) processing the update.
    pub const BOT: &str = "bot";
    /// The raw [`Update`](gramflow_core::Update).
    pub const EVENT_UPDATE: &str = "event_update";
    /// Ambient [`Chat`](gramflow_core::Chat) of the update.
    pub const EVENT_CHAT: &str = "event_chat";
    /// Ambient [`User`](gramflow_core::User) of the update.
    pub const EVENT_FROM_USER: &str = "event_from_user";
    /// Ambient [`EventContext`](crate::event::EventContext).
    pub const EVENT_CONTEXT: &str = "event_context";
    /// [`Router`](crate::router::Router) currently propagating the event.
    pub const EVENT_ROUTER: &str = "event_router";
    /// `Arc<HandlerObject>` selected for the event.
    pub const HANDLER: &str = "handler";
    /// [`FsmContext`](crate::fsm::FsmContext) of the conversation.
    pub const STATE: &str = "state";
    /// Current state name as `Option<String>`.
    pub const RAW_STATE: &str = "raw_state";
    /// `Arc<dyn BaseStorage>` backing the FSM.
    pub const FSM_STORAGE: &str = "fsm_storage";
    /// [`CommandObject`](crate::filters::CommandObject) parsed by the command filter.
    pub const COMMAND: &str = "command";
    /// [`ScenesManager`](crate::scene::ScenesManager) of the conversation.
    pub const SCENES: &str = "scenes";
    /// [`SceneWizard`](crate::scene::SceneWizard) of the active scene.
    pub const WIZARD: &str = "wizard";
    /// Regex captures produced by the exception message filter.
    pub const MATCH_EXCEPTION: &str = "match_exception";
}

/// String-keyed map of type-erased values.
///
/// Cloning is shallow: values are reference counted.
#[derive(Clone, Default)]
pub struct Data {
    values: HashMap<String, DataValue>,
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Data").field("keys", &keys).finish()
    }
}

impl Data {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under `key`.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Inserts an already type-erased value.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: DataValue) {
        self.values.insert(key.into(), value);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value under `key` if it exists and has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a clone of the value under `key` if it exists and has type `T`.
    pub fn get_cloned<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.get::<T>(key).cloned()
    }

    /// Returns the type-erased value under `key`.
    pub fn get_raw(&self, key: &str) -> Option<&DataValue> {
        self.values.get(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.values.remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Moves every entry of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: Data) {
        self.values.extend(other.values);
    }

    /// Returns a copy of `self` with `other` merged on top.
    pub fn merged(&self, other: &Data) -> Data {
        let mut out = self.clone();
        out.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    /// Returns a copy holding only the listed keys.
    pub fn narrow<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Data {
        let values = keys
            .into_iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.to_string(), v.clone())))
            .collect();
        Data { values }
    }
}

impl<K: Into<String>, T: Any + Send + Sync> FromIterator<(K, T)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut data = Data::new();
        for (k, v) in iter {
            data.insert(k, v);
        }
        data
    }
}

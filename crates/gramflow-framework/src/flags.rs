//! Handler flags.
//!
//! Flags are registration-time metadata attached to a handler. Middleware
//! and filters read them; dispatch never changes them.
//!
//! ```rust,ignore
//! router
//!     .message()
//!     .on(upload)
//!     .with_flag(FLAGS.chat_action("upload_document"))
//!     .flag("rate_limit", json!({"seconds": 5}))
//!     .register()?;
//!
//! // In a middleware:
//! if let Some(action) = get_flag(&data, "chat_action") { ... }
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::{Data, keys};
use crate::handler::HandlerObject;

/// Flags of one handler.
pub type Flags = Map<String, Value>;

/// A named flag value.
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    pub name: String,
    pub value: Value,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A reusable flag builder. The value defaults to `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagDecorator {
    flag: Flag,
}

impl FlagDecorator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            flag: Flag::new(name, true),
        }
    }

    /// Same flag with another value.
    pub fn value(&self, value: impl Into<Value>) -> Self {
        Self {
            flag: Flag::new(self.flag.name.clone(), value),
        }
    }

    pub fn flag(&self) -> &Flag {
        &self.flag
    }
}

impl From<FlagDecorator> for Flag {
    fn from(decorator: FlagDecorator) -> Self {
        decorator.flag
    }
}

/// Manufactures [`FlagDecorator`]s by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagGenerator;

/// The shared flag generator.
pub static FLAGS: FlagGenerator = FlagGenerator;

impl FlagGenerator {
    /// A decorator for the flag `name`.
    pub fn get(&self, name: &str) -> FlagDecorator {
        FlagDecorator::new(name)
    }

    /// `chat_action` flag, read by chat action middleware.
    pub fn chat_action(&self, action: &str) -> FlagDecorator {
        self.get("chat_action").value(action)
    }

    /// `rate_limit` flag.
    pub fn rate_limit(&self, key: &str) -> FlagDecorator {
        self.get("rate_limit").value(serde_json::json!({ "key": key }))
    }
}

// ============================================================================
// Reading flags
// ============================================================================

/// Something flags can be read from.
pub trait FlagSource {
    fn handler_flags(&self) -> Option<&Flags>;
}

impl FlagSource for HandlerObject {
    fn handler_flags(&self) -> Option<&Flags> {
        Some(self.flags())
    }
}

impl FlagSource for Arc<HandlerObject> {
    fn handler_flags(&self) -> Option<&Flags> {
        Some(self.flags())
    }
}

/// Reads the flags of the handler stored under `handler`.
impl FlagSource for Data {
    fn handler_flags(&self) -> Option<&Flags> {
        self.get::<Arc<HandlerObject>>(keys::HANDLER)
            .map(|h| h.flags())
    }
}

/// The flags of `source`, or an empty map.
pub fn extract_flags(source: &impl FlagSource) -> Flags {
    source.handler_flags().cloned().unwrap_or_default()
}

/// The value of flag `name`.
pub fn get_flag(source: &impl FlagSource, name: &str) -> Option<Value> {
    source.handler_flags().and_then(|f| f.get(name)).cloned()
}

/// The value of flag `name`, or `default`.
pub fn get_flag_or(source: &impl FlagSource, name: &str, default: Value) -> Value {
    get_flag(source, name).unwrap_or(default)
}

/// Evaluates `predicate` over the flags of `source`.
pub fn check_flags(source: &impl FlagSource, predicate: impl FnOnce(&Flags) -> bool) -> bool {
    match source.handler_flags() {
        Some(flags) => predicate(flags),
        None => predicate(&Flags::new()),
    }
}

//! Extractor system for handler parameters.
//!
//! Every handler parameter implements [`FromContext`]. Extractors do two
//! things:
//!
//! - At registration, [`FromContext::declare`] records which context keys the
//!   parameter reads. The union over all parameters is the handler's
//!   [`ParamSpec`], computed once.
//! - At dispatch, [`FromContext::from_context`] builds the value from the
//!   event and the (narrowed) context data.
//!
//! ```rust,ignore
//! context_key!(pub ChatId: i64 = "chat_id");
//!
//! // Sees only `chat_id`.
//! async fn narrow(message: Message, chat_id: Dep<ChatId>) {}
//!
//! // Sees every context value.
//! async fn wide(message: Message, data: Data) {}
//! ```

mod context;
mod event;

pub use context::{ContextKey, Dep, EventChat, EventFromUser, HandlerFlags, RawState};

use std::any::{Any, type_name};

use crate::context::Data;
use crate::error::{ExtractError, ExtractResult};
use crate::event::TelegramEvent;

// ============================================================================
// ParamSpec
// ============================================================================

/// The context keys a handler reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSpec {
    keys: Vec<&'static str>,
    accepts_all: bool,
}

impl ParamSpec {
    /// Declares a key. Duplicates are ignored.
    pub fn key(&mut self, key: &'static str) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    /// Declares that the handler reads every context value.
    pub fn accept_all(&mut self) {
        self.accepts_all = true;
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    /// Whether a parameter reads every context value.
    pub fn accepts_all(&self) -> bool {
        self.accepts_all
    }

    /// Restricts `data` to what the handler declared.
    pub fn narrow(&self, data: Data) -> Data {
        if self.accepts_all {
            data
        } else {
            data.narrow(self.keys.iter().copied())
        }
    }
}

// ============================================================================
// FromContext
// ============================================================================

/// A type that can be used as a handler parameter.
///
/// # Example
///
/// ```rust,ignore
/// struct Locale(String);
///
/// impl FromContext for Locale {
///     fn declare(spec: &mut ParamSpec) {
///         spec.key(keys::EVENT_FROM_USER);
///     }
///
///     fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
///         let user: User = required(data, keys::EVENT_FROM_USER)?;
///         Ok(Locale(user.language_code.unwrap_or_else(|| "en".into())))
///     }
/// }
/// ```
pub trait FromContext: Sized + Send + 'static {
    /// Records the context keys this parameter reads.
    fn declare(_spec: &mut ParamSpec) {}

    /// Builds the parameter value.
    fn from_context(event: &TelegramEvent, data: &Data) -> ExtractResult<Self>;
}

/// Clones the value under `key`, failing when it is absent or has another type.
pub fn required<T: Any + Clone>(data: &Data, key: &'static str) -> ExtractResult<T> {
    let raw = data.get_raw(key).ok_or(ExtractError::Missing { key })?;
    raw.downcast_ref::<T>()
        .cloned()
        .ok_or(ExtractError::TypeMismatch {
            key,
            expected: type_name::<T>(),
        })
}

impl<T: FromContext> FromContext for Option<T> {
    fn declare(spec: &mut ParamSpec) {
        T::declare(spec);
    }

    fn from_context(event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        Ok(T::from_context(event, data).ok())
    }
}

impl<T: FromContext> FromContext for ExtractResult<T> {
    fn declare(spec: &mut ParamSpec) {
        T::declare(spec);
    }

    fn from_context(event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        Ok(T::from_context(event, data))
    }
}

/// The whole context. Handlers taking it are never narrowed.
impl FromContext for Data {
    fn declare(spec: &mut ParamSpec) {
        spec.accept_all();
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        Ok(data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_spec_dedup() {
        let mut spec = ParamSpec::default();
        spec.key("bot");
        spec.key("state");
        spec.key("bot");
        assert_eq!(spec.keys(), ["bot", "state"]);
        assert!(!spec.accepts_all());
    }

    #[test]
    fn test_narrow() {
        let mut spec = ParamSpec::default();
        spec.key("chat_id");
        let data = Data::new().with("chat_id", 42i64).with("unrelated", "x");
        let narrowed = spec.narrow(data.clone());
        assert!(narrowed.contains("chat_id"));
        assert!(!narrowed.contains("unrelated"));

        spec.accept_all();
        assert!(spec.narrow(data).contains("unrelated"));
    }

    #[test]
    fn test_required_errors() {
        let data = Data::new().with("n", 1u8);
        assert!(matches!(
            required::<u8>(&data, "missing"),
            Err(ExtractError::Missing { key: "missing" })
        ));
        assert!(matches!(
            required::<String>(&data, "n"),
            Err(ExtractError::TypeMismatch { key: "n", .. })
        ));
        assert_eq!(required::<u8>(&data, "n").unwrap(), 1);
    }
}

//! Error types for the gramflow framework.
//!
//! Errors fall into three groups:
//!
//! - **Structural** errors ([`RouterError`], [`FilterError`], [`SceneError`])
//!   are returned synchronously while the router tree is being assembled.
//! - **Control flow** signals ([`DispatchError::Skip`], [`DispatchError::Cancel`])
//!   are consumed by observers and routers and never reach error handlers.
//! - Everything else raised while processing an update is a
//!   [`DispatchError`] that the errors middleware offers to `error` handlers.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use gramflow_core::ApiError;
use thiserror::Error;

// =============================================================================
// Control flow signals
// =============================================================================

/// Defers the current update to the next handler of the same observer.
///
/// Return `Err(SkipHandler.into())` from a handler or inner middleware.
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("handler skipped")]
pub struct SkipHandler;

/// Aborts processing of the current update across the whole router tree.
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("update processing cancelled")]
pub struct CancelHandler;

// =============================================================================
// DispatchError
// =============================================================================

/// A plain message error raised by user code.
#[derive(Debug, Clone)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

/// Errors produced while an update travels through the router tree.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// See [`SkipHandler`].
    #[error("handler skipped")]
    Skip,

    /// See [`CancelHandler`].
    #[error("update processing cancelled")]
    Cancel,

    /// A handler parameter could not be extracted.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A Bot API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The FSM storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A scene transition failed.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Any other error raised by a handler, filter or middleware.
    #[error("{0}")]
    Handler(Arc<dyn StdError + Send + Sync>),
}

impl DispatchError {
    /// Wraps an arbitrary error raised by user code.
    pub fn handler<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(err))
    }

    /// Creates a handler error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Handler(Arc::new(MessageError(message.into())))
    }

    /// Whether this is [`Skip`](Self::Skip) or [`Cancel`](Self::Cancel).
    pub fn is_control_flow(&self) -> bool {
        matches!(self, Self::Skip | Self::Cancel)
    }

    /// Returns the underlying error as `E` when it has that type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Skip | Self::Cancel => None,
            Self::Extract(e) => (e as &(dyn StdError + 'static)).downcast_ref(),
            Self::Api(e) => (e as &(dyn StdError + 'static)).downcast_ref(),
            Self::Storage(e) => (e as &(dyn StdError + 'static)).downcast_ref(),
            Self::Scene(e) => (e as &(dyn StdError + 'static)).downcast_ref(),
            Self::Handler(e) => e.downcast_ref(),
        }
    }
}

impl From<SkipHandler> for DispatchError {
    fn from(_: SkipHandler) -> Self {
        Self::Skip
    }
}

impl From<CancelHandler> for DispatchError {
    fn from(_: CancelHandler) -> Self {
        Self::Cancel
    }
}

impl From<String> for DispatchError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for DispatchError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

// =============================================================================
// Extraction
// =============================================================================

/// Errors that can occur during parameter extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// A required context key is absent.
    #[error("context key '{key}' is missing")]
    Missing {
        /// The missing key.
        key: &'static str,
    },

    /// The context value has another type than requested.
    #[error("context key '{key}' is not a '{expected}'")]
    TypeMismatch {
        /// The offending key.
        key: &'static str,
        /// Requested type name.
        expected: &'static str,
    },

    /// The event is of another kind than requested.
    #[error("event type mismatch: expected '{expected}', got '{got}'")]
    EventTypeMismatch {
        /// Expected event type name.
        expected: &'static str,
        /// Actual event type name.
        got: &'static str,
    },

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

// =============================================================================
// Structural errors
// =============================================================================

/// Errors raised while assembling the router tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A router was included into itself.
    #[error("router '{0}' cannot be included into itself")]
    SelfReference(String),

    /// The router already has a parent.
    #[error("router '{child}' is already attached to router '{parent}'")]
    AlreadyAttached {
        /// Name of the router being attached.
        child: String,
        /// Name of its current parent.
        parent: String,
    },

    /// Attaching the router would make it its own ancestor.
    #[error("including router '{child}' into '{parent}' would create a cycle")]
    Cycle {
        /// Name of the router being attached.
        child: String,
        /// Name of the router it was attached to.
        parent: String,
    },
}

/// Errors raised while resolving keyword filters at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Keywords that no bound filter factory declares.
    #[error("no bound filter accepts the keyword(s): {}", keys.join(", "))]
    Unresolved {
        /// The leftover keywords, sorted.
        keys: Vec<String>,
    },

    /// A keyword declared by more than one bound filter factory.
    #[error("keyword '{key}' is ambiguous between filters '{first}' and '{second}'")]
    Ambiguous {
        /// The keyword.
        key: String,
        /// First factory declaring it.
        first: String,
        /// Second factory declaring it.
        second: String,
    },

    /// A keyword value has the wrong shape.
    #[error("invalid value for keyword '{key}': {reason}")]
    InvalidValue {
        /// The keyword.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl FilterError {
    /// Creates an invalid value error.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the FSM storage.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by scene registration and transitions.
#[derive(Debug, Clone, Error)]
pub enum SceneError {
    /// A scene with the same state name is already registered.
    #[error("scene '{0}' is already registered")]
    Duplicate(String),

    /// No scene is registered under this state name.
    #[error("scene '{0}' is not registered")]
    NotFound(String),

    /// The router the registry was created on no longer exists.
    #[error("router '{0}' of the scene registry was dropped")]
    RouterDropped(String),

    /// The scene router could not be attached.
    #[error(transparent)]
    Attach(#[from] RouterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_flow() {
        assert!(DispatchError::from(SkipHandler).is_control_flow());
        assert!(DispatchError::from(CancelHandler).is_control_flow());
        assert!(!DispatchError::msg("boom").is_control_flow());
    }

    #[test]
    fn test_downcast_handler_error() {
        let err = DispatchError::handler(std::io::Error::other("disk full"));
        assert!(err.downcast_ref::<std::io::Error>().is_some());
        assert!(err.downcast_ref::<ApiError>().is_none());
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_downcast_typed_variant() {
        let err = DispatchError::from(ApiError::Timeout);
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Timeout)));
    }

    #[test]
    fn test_unresolved_message() {
        let err = FilterError::Unresolved {
            keys: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(err.to_string(), "no bound filter accepts the keyword(s): foo, bar");
    }
}

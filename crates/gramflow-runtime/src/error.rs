//! Runtime error types.

use gramflow_core::ApiError;
use gramflow_framework::DispatchError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A Bot API call failed beyond recovery.
    #[error("Bot API error: {0}")]
    Api(#[from] ApiError),

    /// A startup or shutdown handler failed.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

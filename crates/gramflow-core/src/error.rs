//! Error types for Bot API calls.

use thiserror::Error;

/// Errors that can occur while talking to the Bot API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The token does not look like `<bot id>:<secret>`.
    #[error("invalid bot token: {0}")]
    InvalidToken(String),

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// `400 Bad Request`.
    #[error("bad request: {description}")]
    BadRequest {
        /// Description returned by the server.
        description: String,
    },

    /// `401 Unauthorized`, usually a revoked token.
    #[error("unauthorized: {description}")]
    Unauthorized {
        /// Description returned by the server.
        description: String,
    },

    /// `403 Forbidden`, e.g. the bot was blocked by the user.
    #[error("forbidden: {description}")]
    Forbidden {
        /// Description returned by the server.
        description: String,
    },

    /// `404 Not Found`.
    #[error("method not found: {description}")]
    NotFound {
        /// Description returned by the server.
        description: String,
    },

    /// `409 Conflict`, another `getUpdates` or webhook is active.
    #[error("conflict: {description}")]
    Conflict {
        /// Description returned by the server.
        description: String,
    },

    /// Flood control: the request may be repeated after `retry_after` seconds.
    #[error("flood control exceeded, retry after {retry_after}s: {description}")]
    RetryAfter {
        /// Seconds to wait before retrying.
        retry_after: u64,
        /// Description returned by the server.
        description: String,
    },

    /// The group was upgraded to a supergroup with a new identifier.
    #[error("chat migrated to {migrate_to_chat_id}: {description}")]
    MigrateToChat {
        /// The new chat identifier.
        migrate_to_chat_id: i64,
        /// Description returned by the server.
        description: String,
    },

    /// `5xx` or any other unexpected error code.
    #[error("telegram server error {code}: {description}")]
    Server {
        /// HTTP-like error code.
        code: i32,
        /// Description returned by the server.
        description: String,
    },
}

impl ApiError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Maps a Bot API `error_code` to the matching variant.
    pub fn from_code(code: i32, description: impl Into<String>) -> Self {
        let description = description.into();
        match code {
            400 => Self::BadRequest { description },
            401 => Self::Unauthorized { description },
            403 => Self::Forbidden { description },
            404 => Self::NotFound { description },
            409 => Self::Conflict { description },
            _ => Self::Server { code, description },
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::RetryAfter { .. } | Self::Server { .. }
        )
    }
}

/// Result type for Bot API operations.
pub type ApiResult<T> = Result<T, ApiError>;

//! Errors raised while loading or checking a [`GramflowConfig`](super::GramflowConfig).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// The merged sources do not deserialize into the schema.
    #[error("cannot parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {message}")]
    ValidationError { message: String },

    #[error("config field `{field}` is required")]
    MissingField { field: String },

    /// `bot.api_base` is not an http(s) URL.
    #[error("invalid Bot API URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

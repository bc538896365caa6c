//! Layered configuration for a gramflow bot.
//!
//! Settings come from built-in defaults, `gramflow.toml` (or YAML with the
//! `yaml-config` feature) and `GRAMFLOW_*` environment variables.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, FsmConfig, GramflowConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PollingConfig, RetryConfig, SpanEventConfig,
};
pub use validation::validate_config;

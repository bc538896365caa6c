//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use gramflow_framework::fsm::FsmStrategy;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GramflowConfig {
    /// The bot account and Bot API server.
    #[serde(default)]
    pub bot: BotConfig,

    /// Long polling settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// FSM settings.
    #[serde(default)]
    pub fsm: FsmConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot account configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Token issued by @BotFather, `<id>:<secret>`.
    #[serde(default)]
    pub token: String,

    /// Base URL of the Bot API server.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Whether the server is a local Bot API server.
    #[serde(default)]
    pub local_api: bool,

    /// Default request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            local_api: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BotConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

// =============================================================================
// Polling
// =============================================================================

/// Long polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// `getUpdates` long polling timeout in seconds.
    #[serde(default = "default_polling_timeout_secs")]
    pub timeout_secs: u64,

    /// Update types to receive. Resolved from the registered handlers when
    /// absent.
    #[serde(default)]
    pub allowed_updates: Option<Vec<String>>,

    /// Skip updates that arrived while the bot was offline.
    #[serde(default)]
    pub drop_pending_updates: bool,

    /// Process each update in its own task instead of one after another.
    ///
    /// Scene and FSM transitions of one conversation may then interleave.
    #[serde(default)]
    pub handle_as_tasks: bool,

    /// Backoff applied when `getUpdates` fails.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_polling_timeout_secs(),
            allowed_updates: None,
            drop_pending_updates: false,
            handle_as_tasks: false,
            retry: RetryConfig::default(),
        }
    }
}

fn default_polling_timeout_secs() -> u64 {
    10
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of consecutive failures before polling gives up.
    /// `0` retries forever.
    #[serde(default)]
    pub max_retries: u32,

    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt`, starting at 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether `failures` consecutive failures exhaust the budget.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_retries != 0 && failures > self.max_retries
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    1.3
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `gramflow_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// FSM
// =============================================================================

/// FSM configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsmConfig {
    /// How storage keys are derived from chat, user and topic.
    #[serde(default)]
    pub strategy: FsmStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff() {
        let retry = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 3000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay(1), Duration::from_millis(1000));
        assert_eq!(retry.delay(2), Duration::from_millis(2000));
        assert_eq!(retry.delay(3), Duration::from_millis(3000));
        assert_eq!(retry.delay(30), Duration::from_millis(3000));

        assert!(!retry.exhausted(3));
        assert!(retry.exhausted(4));
        assert!(!RetryConfig::default().exhausted(u32::MAX));
    }
}

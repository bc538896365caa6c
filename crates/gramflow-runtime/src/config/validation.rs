//! Configuration validation utilities.

use gramflow_core::{UpdateType, validate_token};

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, GramflowConfig, LogOutput, LoggingConfig, PollingConfig, RetryConfig};

/// Longest long polling timeout accepted by the Bot API.
const MAX_POLLING_TIMEOUT_SECS: u64 = 50;

/// Validates the entire configuration.
pub fn validate_config(config: &GramflowConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_polling_config(&config.polling)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    validate_token(&bot.token).map_err(|e| ConfigError::validation(e.to_string()))?;
    validate_url(&bot.api_base)?;

    if bot.request_timeout_secs == 0 {
        return Err(ConfigError::validation("Request timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.timeout_secs > MAX_POLLING_TIMEOUT_SECS {
        return Err(ConfigError::validation(format!(
            "Polling timeout must be at most {MAX_POLLING_TIMEOUT_SECS} seconds"
        )));
    }

    if let Some(allowed) = &polling.allowed_updates {
        for name in allowed {
            if !UpdateType::ALL.iter().any(|t| t.as_str() == name) {
                return Err(ConfigError::validation(format!("Unknown update type: {name}")));
            }
        }
    }

    validate_retry_config(&polling.retry)
}

fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_base"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }
    Ok(())
}

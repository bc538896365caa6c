//! Bot API method calls and the response envelope.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// A Bot API method call: the method name and its JSON parameters.
///
/// # Example
///
/// ```rust,ignore
/// let method = TelegramMethod::new("sendMessage")
///     .param("chat_id", 42)
///     .param("text", "hello");
/// let sent: Message = bot.call(method).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramMethod {
    /// Method name, e.g. `sendMessage`.
    pub name: Cow<'static, str>,
    /// Parameters sent as the JSON request body.
    pub params: Map<String, Value>,
}

impl TelegramMethod {
    /// Creates a call of `name` without parameters.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Adds a parameter. `null` values are dropped.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.params.insert(key.to_string(), value);
        }
        self
    }

    /// `getMe`.
    pub fn get_me() -> Self {
        Self::new("getMe")
    }

    /// `getUpdates`.
    pub fn get_updates(
        offset: Option<i64>,
        limit: Option<u32>,
        timeout: Option<u64>,
        allowed_updates: Option<Vec<String>>,
    ) -> Self {
        Self::new("getUpdates")
            .param("offset", offset)
            .param("limit", limit)
            .param("timeout", timeout)
            .param("allowed_updates", allowed_updates)
    }

    /// `sendMessage`.
    pub fn send_message(chat_id: i64, text: impl Into<String>) -> Self {
        Self::new("sendMessage")
            .param("chat_id", chat_id)
            .param("text", text.into())
    }

    /// `answerCallbackQuery`.
    pub fn answer_callback_query(callback_query_id: impl Into<String>, text: Option<String>) -> Self {
        Self::new("answerCallbackQuery")
            .param("callback_query_id", callback_query_id.into())
            .param("text", text)
    }

    /// `sendChatAction`, e.g. `typing`.
    pub fn send_chat_action(chat_id: i64, action: impl Into<String>) -> Self {
        Self::new("sendChatAction")
            .param("chat_id", chat_id)
            .param("action", action.into())
    }
}

/// Extra information attached to some error responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseParameters {
    /// The group was migrated to a supergroup with this identifier.
    #[serde(default)]
    pub migrate_to_chat_id: Option<i64>,
    /// Seconds to wait before the request can be repeated.
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// The `{ok, result, description, error_code, parameters}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub ok: bool,
    /// Result of the request, present when `ok`.
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    /// Human-readable error description.
    #[serde(default)]
    pub description: Option<String>,
    /// Error code.
    #[serde(default)]
    pub error_code: Option<i32>,
    /// Additional error parameters.
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

impl<T> ApiResponse<T> {
    /// Converts the envelope into a result.
    pub fn into_result(self) -> ApiResult<T> {
        let description = self.description.unwrap_or_default();
        if self.ok {
            return self
                .result
                .ok_or_else(|| ApiError::decode("response is ok but has no result"));
        }
        if let Some(params) = self.parameters {
            if let Some(retry_after) = params.retry_after {
                return Err(ApiError::RetryAfter {
                    retry_after,
                    description,
                });
            }
            if let Some(migrate_to_chat_id) = params.migrate_to_chat_id {
                return Err(ApiError::MigrateToChat {
                    migrate_to_chat_id,
                    description,
                });
            }
        }
        Err(ApiError::from_code(self.error_code.unwrap_or(0), description))
    }
}

/// Decodes a raw response body into the result of a method call.
pub fn decode_response<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    let response: ApiResponse<T> =
        serde_json::from_slice(body).map_err(|e| ApiError::decode(e.to_string()))?;
    response.into_result()
}

/// Base URLs of a Bot API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramApiServer {
    /// Method endpoint template base, e.g. `https://api.telegram.org`.
    pub base: String,
    /// Whether the server is a local Bot API server serving files from disk.
    #[serde(default)]
    pub is_local: bool,
}

impl Default for TelegramApiServer {
    fn default() -> Self {
        Self::new("https://api.telegram.org")
    }
}

impl TelegramApiServer {
    /// Creates a server description from its base URL.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            is_local: false,
        }
    }

    /// URL of a method call.
    pub fn api_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.base, token, method)
    }

    /// URL of a file download.
    pub fn file_url(&self, token: &str, path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base, token, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_drops_null() {
        let method = TelegramMethod::get_updates(Some(10), None, Some(30), None);
        assert_eq!(method.params.get("offset"), Some(&json!(10)));
        assert!(!method.params.contains_key("limit"));
    }

    #[test]
    fn test_decode_ok() {
        let value: i64 = decode_response(br#"{"ok": true, "result": 5}"#).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_decode_retry_after() {
        let body = br#"{"ok": false, "error_code": 429, "description": "Too Many Requests", "parameters": {"retry_after": 3}}"#;
        let err = decode_response::<Value>(body).unwrap_err();
        assert!(matches!(err, ApiError::RetryAfter { retry_after: 3, .. }));
    }

    #[test]
    fn test_server_urls() {
        let server = TelegramApiServer::new("http://localhost:8081/");
        assert_eq!(
            server.api_url("1:abc", "getMe"),
            "http://localhost:8081/bot1:abc/getMe"
        );
        assert_eq!(
            server.file_url("1:abc", "photos/a.jpg"),
            "http://localhost:8081/file/bot1:abc/photos/a.jpg"
        );
    }
}

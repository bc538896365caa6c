//! The [`Bot`] handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::{ApiError, ApiResult};
use crate::method::TelegramMethod;
use crate::session::{ContentStream, Session};
use crate::types::{Message, Update, User};

/// Default chunk size for file downloads.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

struct BotInner {
    token: String,
    id: i64,
    session: Arc<dyn Session>,
    me: OnceCell<User>,
}

/// A bot identity bound to a [`Session`].
///
/// Cheap to clone; clones share the session and the cached `getMe` result.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot").field("id", &self.inner.id).finish_non_exhaustive()
    }
}

/// Checks the `<bot id>:<secret>` shape of a token and returns the bot id.
pub fn validate_token(token: &str) -> ApiResult<i64> {
    if token.chars().any(char::is_whitespace) {
        return Err(ApiError::InvalidToken("token contains whitespace".into()));
    }
    let (id, secret) = token
        .split_once(':')
        .ok_or_else(|| ApiError::InvalidToken("token has no ':' separator".into()))?;
    if secret.is_empty() {
        return Err(ApiError::InvalidToken("token secret is empty".into()));
    }
    id.parse::<i64>()
        .map_err(|_| ApiError::InvalidToken(format!("'{id}' is not a numeric bot id")))
}

impl Bot {
    /// Creates a bot for `token` using `session` as transport.
    pub fn new(token: impl Into<String>, session: Arc<dyn Session>) -> ApiResult<Self> {
        let token = token.into();
        let id = validate_token(&token)?;
        Ok(Self {
            inner: Arc::new(BotInner {
                token,
                id,
                session,
                me: OnceCell::new(),
            }),
        })
    }

    /// Pre-populates the cached `getMe` result.
    pub fn with_me(self, me: User) -> Self {
        // A fresh bot has an empty cell; on a shared bot the first value wins.
        let _ = self.inner.me.set(me);
        self
    }

    /// Bot identifier taken from the token.
    pub fn id(&self) -> i64 {
        self.inner.id
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.inner.token
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.inner.session
    }

    /// Calls `method` and decodes its result into `T`.
    pub async fn call<T: DeserializeOwned>(&self, method: TelegramMethod) -> ApiResult<T> {
        self.call_with_timeout(method, None).await
    }

    /// Calls `method` with an explicit request timeout.
    pub async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: TelegramMethod,
        timeout: Option<Duration>,
    ) -> ApiResult<T> {
        trace!(bot_id = self.inner.id, method = %method.name, "Calling Bot API method");
        let value = self
            .inner
            .session
            .make_request(&self.inner.token, &method, timeout)
            .await?;
        serde_json::from_value(value).map_err(|e| ApiError::decode(e.to_string()))
    }

    /// Information about the bot itself, fetched once and cached.
    pub async fn me(&self) -> ApiResult<User> {
        self.inner
            .me
            .get_or_try_init(|| async {
                debug!(bot_id = self.inner.id, "Fetching bot identity");
                self.get_me().await
            })
            .await
            .cloned()
    }

    /// `getMe` without caching.
    pub async fn get_me(&self) -> ApiResult<User> {
        self.call(TelegramMethod::get_me()).await
    }

    /// `getUpdates`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        allowed_updates: Option<Vec<String>>,
        request_timeout: Option<Duration>,
    ) -> ApiResult<Vec<Update>> {
        let method = TelegramMethod::get_updates(offset, None, Some(timeout_secs), allowed_updates);
        self.call_with_timeout(method, request_timeout).await
    }

    /// `sendMessage`.
    pub async fn send_message(&self, chat_id: i64, text: impl Into<String>) -> ApiResult<Message> {
        self.call(TelegramMethod::send_message(chat_id, text)).await
    }

    /// `answerCallbackQuery`.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: impl Into<String>,
        text: Option<String>,
    ) -> ApiResult<bool> {
        self.call(TelegramMethod::answer_callback_query(callback_query_id, text))
            .await
    }

    /// `sendChatAction`.
    pub async fn send_chat_action(&self, chat_id: i64, action: impl Into<String>) -> ApiResult<bool> {
        self.call(TelegramMethod::send_chat_action(chat_id, action))
            .await
    }

    /// Streams a file previously resolved with `getFile`.
    pub async fn download_file(
        &self,
        file_path: &str,
        timeout: Duration,
        chunk_size: usize,
    ) -> ApiResult<ContentStream> {
        let session = &self.inner.session;
        let url = session.api().file_url(&self.inner.token, file_path);
        session.stream_content(&url, timeout, chunk_size).await
    }
}

//! Transport abstraction used by [`Bot`](crate::Bot).
//!
//! A [`Session`] knows how to deliver a [`TelegramMethod`] to a Bot API
//! server and how to stream a file back. The HTTP implementation lives in
//! `gramflow-transport`; tests use in-memory sessions.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::ApiResult;
use crate::method::{TelegramApiServer, TelegramMethod};

/// A stream of downloaded chunks.
pub type ContentStream = BoxStream<'static, ApiResult<Vec<u8>>>;

/// Delivers method calls to the Bot API.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// The server this session talks to.
    fn api(&self) -> &TelegramApiServer;

    /// Performs a method call and returns the decoded `result` field.
    ///
    /// `timeout` overrides the session's default request timeout; long
    /// polling passes its poll timeout plus a margin here.
    async fn make_request(
        &self,
        token: &str,
        method: &TelegramMethod,
        timeout: Option<Duration>,
    ) -> ApiResult<Value>;

    /// Streams the body at `url` in chunks of at most `chunk_size` bytes.
    async fn stream_content(
        &self,
        url: &str,
        timeout: Duration,
        chunk_size: usize,
    ) -> ApiResult<ContentStream>;

    /// Releases underlying connections.
    async fn close(&self) {}
}

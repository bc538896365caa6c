//! Fixtures shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gramflow_core::{
    ApiError, ApiResult, Bot, ContentStream, Session, TelegramApiServer, TelegramMethod, User,
};
use serde_json::Value;

/// A session that refuses every request.
pub(crate) struct OfflineSession {
    api: TelegramApiServer,
}

#[async_trait]
impl Session for OfflineSession {
    fn api(&self) -> &TelegramApiServer {
        &self.api
    }

    async fn make_request(
        &self,
        _token: &str,
        method: &TelegramMethod,
        _timeout: Option<Duration>,
    ) -> ApiResult<Value> {
        Err(ApiError::network(format!("offline: {}", method.name)))
    }

    async fn stream_content(
        &self,
        _url: &str,
        _timeout: Duration,
        _chunk_size: usize,
    ) -> ApiResult<ContentStream> {
        Err(ApiError::network("offline"))
    }
}

/// Bot 42, `@tbot`, with its identity cached.
pub(crate) fn test_bot() -> Bot {
    let session = Arc::new(OfflineSession {
        api: TelegramApiServer::default(),
    });
    Bot::new("42:test-token", session)
        .expect("valid token")
        .with_me(User {
            id: 42,
            is_bot: true,
            first_name: "Test".into(),
            username: Some("tbot".into()),
            ..Default::default()
        })
}

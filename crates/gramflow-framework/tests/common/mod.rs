//! Fixtures shared by the scenario tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gramflow_core::{
    ApiError, ApiResult, Bot, CallbackQuery, Chat, ContentStream, Message, Session, TelegramApiServer,
    TelegramMethod, Update, User,
};
use parking_lot::Mutex;
use serde_json::Value;

/// Records requests and answers every one with `true`.
#[derive(Default)]
pub struct RecordingSession {
    api: TelegramApiServer,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Session for RecordingSession {
    fn api(&self) -> &TelegramApiServer {
        &self.api
    }

    async fn make_request(
        &self,
        _token: &str,
        method: &TelegramMethod,
        _timeout: Option<Duration>,
    ) -> ApiResult<Value> {
        self.calls.lock().push(method.name.to_string());
        Ok(Value::Bool(true))
    }

    async fn stream_content(
        &self,
        _url: &str,
        _timeout: Duration,
        _chunk_size: usize,
    ) -> ApiResult<ContentStream> {
        Err(ApiError::network("no content in tests"))
    }
}

/// Bot 42 named `@tbot`.
pub fn bot() -> Bot {
    Bot::new("42:scenario-token", Arc::new(RecordingSession::default()))
        .unwrap()
        .with_me(User {
            id: 42,
            is_bot: true,
            first_name: "Scenario".into(),
            username: Some("tbot".into()),
            ..Default::default()
        })
}

/// A text message from user 7 in chat 100.
pub fn message(update_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            chat: Chat {
                id: 100,
                ..Default::default()
            },
            from: Some(User {
                id: 7,
                first_name: "Ann".into(),
                ..Default::default()
            }),
            text: Some(text.into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Log::default()
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// A button press by user 7 on a message in chat 100.
pub fn callback_query(update_id: i64, data: &str) -> Update {
    let message = message(update_id, "menu").message.unwrap();
    Update {
        update_id,
        callback_query: Some(CallbackQuery {
            id: update_id.to_string(),
            from: message.from.clone().unwrap_or_default(),
            message: Some(Box::new(message)),
            data: Some(data.into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

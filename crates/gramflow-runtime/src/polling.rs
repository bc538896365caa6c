//! Long polling driver.
//!
//! [`Polling`] repeatedly calls `getUpdates`, feeds every update through a
//! [`DispatchService`] and advances the offset past it. Failed calls back off
//! exponentially following [`RetryConfig`]; flood control waits the number of
//! seconds the server asks for.
//!
//! ```rust,ignore
//! let shutdown = CancellationToken::new();
//! Polling::new(bot, dispatcher, config.polling).run(shutdown.child_token()).await?;
//! ```

use std::time::{Duration, Instant};

use gramflow_core::{ApiError, Bot, TelegramMethod, Update};
use gramflow_framework::{DispatchService, Dispatcher, Outcome};
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{PollingConfig, RetryConfig};
use crate::error::{RuntimeError, RuntimeResult};

/// Extra time granted to a `getUpdates` request beyond its poll timeout.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Long polling loop for one bot.
pub struct Polling {
    bot: Bot,
    dispatcher: Dispatcher,
    config: PollingConfig,
}

impl Polling {
    pub fn new(bot: Bot, dispatcher: Dispatcher, config: PollingConfig) -> Self {
        Self {
            bot,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Update types requested from the server: the configured list, or every
    /// type some handler in the router tree listens for.
    pub fn allowed_updates(&self) -> Vec<String> {
        match &self.config.allowed_updates {
            Some(allowed) => allowed.clone(),
            None => self
                .dispatcher
                .resolve_used_update_types()
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        }
    }

    /// Polls until `shutdown` is cancelled or the retry budget runs out.
    ///
    /// Updates spawned as tasks are awaited before returning.
    pub async fn run(&self, shutdown: CancellationToken) -> RuntimeResult<()> {
        let allowed_updates = self.allowed_updates();
        let service = self.dispatcher.service(self.bot.clone());
        let mut tasks = JoinSet::new();

        info!(
            bot_id = self.bot.id(),
            allowed_updates = ?allowed_updates,
            "Start polling"
        );

        let mut offset = if self.config.drop_pending_updates {
            self.skip_pending(&shutdown).await?
        } else {
            None
        };
        let mut failures: u32 = 0;

        while !shutdown.is_cancelled() {
            let request = self.bot.get_updates(
                offset,
                self.config.timeout_secs,
                Some(allowed_updates.clone()),
                Some(Duration::from_secs(self.config.timeout_secs) + REQUEST_TIMEOUT_MARGIN),
            );
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = request => result,
            };

            let updates = match result {
                Ok(updates) => {
                    if failures > 0 {
                        info!(failures, "Connection established again");
                        failures = 0;
                    }
                    updates
                }
                Err(err) => {
                    failures += 1;
                    let delay = backoff(&self.config.retry, failures, &err)?;
                    warn!(
                        error = %err,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "Failed to fetch updates"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                if self.config.handle_as_tasks {
                    tasks.spawn(process_update(service.clone(), update));
                } else {
                    process_update(service.clone(), update).await;
                }
            }
            while tasks.try_join_next().is_some() {}
        }

        if !tasks.is_empty() {
            debug!(pending = tasks.len(), "Waiting for update tasks");
            while tasks.join_next().await.is_some() {}
        }
        info!(bot_id = self.bot.id(), "Polling stopped");
        Ok(())
    }

    /// Confirms everything queued on the server and returns the next offset.
    async fn skip_pending(&self, shutdown: &CancellationToken) -> RuntimeResult<Option<i64>> {
        let request = self.bot.get_updates(Some(-1), 0, None, None);
        let updates = tokio::select! {
            _ = shutdown.cancelled() => return Ok(None),
            updates = request => updates?,
        };
        let offset = updates.last().map(|u| u.update_id + 1);
        if let Some(next) = offset {
            info!(next_offset = next, "Dropped pending updates");
        }
        Ok(offset)
    }
}

/// Delay before the next `getUpdates`, or the error that ends polling.
fn backoff(retry: &RetryConfig, failures: u32, err: &ApiError) -> RuntimeResult<Duration> {
    match err {
        ApiError::InvalidToken(_) | ApiError::Unauthorized { .. } => {
            Err(RuntimeError::Api(err.clone()))
        }
        _ if retry.exhausted(failures) => Err(RuntimeError::Api(err.clone())),
        ApiError::RetryAfter { retry_after, .. } => Ok(Duration::from_secs(*retry_after)),
        _ => Ok(retry.delay(failures)),
    }
}

/// Dispatches one update. A [`TelegramMethod`] returned by the handler is
/// sent to the Bot API.
async fn process_update(service: DispatchService, update: Update) {
    let update_id = update.update_id;
    let bot = service.bot().clone();
    let started = Instant::now();

    let span = info_span!("process_update", update_id, bot_id = bot.id());
    async move {
        match service.oneshot(update).await {
            Ok(Outcome::Handled(response)) => {
                if let Some(method) = response.downcast_ref::<TelegramMethod>() {
                    debug!(method = %method.name, "Calling method returned by handler");
                    if let Err(err) = bot.call::<Value>(method.clone()).await {
                        error!(method = %method.name, error = %err, "Returned method failed");
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!(
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Update processing failed"
                );
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use gramflow_core::{ApiResult, ContentStream, Session, TelegramApiServer, User};
    use gramflow_framework::{EventType, Text};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Answers `getUpdates` from a script and cancels `shutdown` once the
    /// script is exhausted.
    struct ScriptedSession {
        api: TelegramApiServer,
        script: Mutex<VecDeque<ApiResult<Value>>>,
        calls: Mutex<Vec<TelegramMethod>>,
        shutdown: CancellationToken,
    }

    #[async_trait]
    impl Session for ScriptedSession {
        fn api(&self) -> &TelegramApiServer {
            &self.api
        }

        async fn make_request(
            &self,
            _token: &str,
            method: &TelegramMethod,
            _timeout: Option<Duration>,
        ) -> ApiResult<Value> {
            self.calls.lock().push(method.clone());
            if method.name != "getUpdates" {
                return Ok(json!(true));
            }
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None => {
                    self.shutdown.cancel();
                    Ok(json!([]))
                }
            }
        }

        async fn stream_content(
            &self,
            _url: &str,
            _timeout: Duration,
            _chunk_size: usize,
        ) -> ApiResult<ContentStream> {
            Err(ApiError::network("not scripted"))
        }
    }

    fn session(script: Vec<ApiResult<Value>>) -> (Arc<ScriptedSession>, Bot, CancellationToken) {
        let shutdown = CancellationToken::new();
        let session = Arc::new(ScriptedSession {
            api: TelegramApiServer::default(),
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            shutdown: shutdown.clone(),
        });
        let bot = Bot::new("42:polling-token", session.clone())
            .unwrap()
            .with_me(User {
                id: 42,
                is_bot: true,
                first_name: "Poller".into(),
                ..Default::default()
            });
        (session, bot, shutdown)
    }

    fn text_update(update_id: i64, text: &str) -> Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "date": 0,
                "chat": {"id": 100, "type": "private"},
                "from": {"id": 7, "is_bot": false, "first_name": "User"},
                "text": text,
            }
        })
    }

    fn get_updates_calls(session: &ScriptedSession) -> Vec<TelegramMethod> {
        session
            .calls
            .lock()
            .iter()
            .filter(|m| m.name == "getUpdates")
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_offset_and_returned_method() {
        let (session, bot, shutdown) = session(vec![Ok(json!([
            text_update(5, "ping"),
            text_update(6, "other"),
        ]))]);

        let dp = Dispatcher::new();
        dp.observer(EventType::Message).register(
            || async { TelegramMethod::send_message(100, "pong") },
            Text::equals(["ping"]),
        );

        Polling::new(bot, dp, PollingConfig::default())
            .run(shutdown)
            .await
            .unwrap();

        let polls = get_updates_calls(&session);
        assert_eq!(polls.len(), 2);
        assert!(!polls[0].params.contains_key("offset"));
        assert_eq!(polls[1].params.get("offset"), Some(&json!(7)));
        assert_eq!(polls[0].params.get("allowed_updates"), Some(&json!(["message"])));

        let sent: Vec<_> = session
            .calls
            .lock()
            .iter()
            .filter(|m| m.name == "sendMessage")
            .map(|m| m.params.get("text").cloned())
            .collect();
        assert_eq!(sent, [Some(json!("pong"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_network_error() {
        let (session, bot, shutdown) = session(vec![
            Err(ApiError::network("connection reset")),
            Err(ApiError::RetryAfter {
                retry_after: 3,
                description: "Too Many Requests".into(),
            }),
            Ok(json!([text_update(1, "hi")])),
        ]);

        let handled = Arc::new(Mutex::new(Vec::new()));
        let seen = handled.clone();
        let dp = Dispatcher::new();
        dp.message().register(
            move |message: gramflow_core::Message| {
                let seen = seen.clone();
                async move { seen.lock().push(message.text.unwrap_or_default()) }
            },
            (),
        );

        let started = tokio::time::Instant::now();
        Polling::new(bot, dp, PollingConfig::default())
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(get_updates_calls(&session).len(), 4);
        assert_eq!(*handled.lock(), ["hi"]);
        // 1s backoff, then the 3s the server asked for.
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let (session, bot, shutdown) = session(vec![
            Err(ApiError::network("down")),
            Err(ApiError::network("down")),
            Err(ApiError::network("down")),
        ]);
        let mut config = PollingConfig::default();
        config.retry.max_retries = 2;

        let err = Polling::new(bot, Dispatcher::new(), config)
            .run(shutdown.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Api(ApiError::Network(_))));
        assert_eq!(get_updates_calls(&session).len(), 3);
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_unauthorized_stops_immediately() {
        let (session, bot, shutdown) = session(vec![Err(ApiError::Unauthorized {
            description: "Unauthorized".into(),
        })]);

        let err = Polling::new(bot, Dispatcher::new(), PollingConfig::default())
            .run(shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Api(ApiError::Unauthorized { .. })));
        assert_eq!(get_updates_calls(&session).len(), 1);
    }

    #[tokio::test]
    async fn test_drop_pending_updates() {
        let (session, bot, shutdown) = session(vec![
            Ok(json!([text_update(40, "old")])),
            Ok(json!([])),
        ]);
        let config = PollingConfig {
            drop_pending_updates: true,
            allowed_updates: Some(vec!["message".into(), "callback_query".into()]),
            ..Default::default()
        };

        let polling = Polling::new(bot, Dispatcher::new(), config);
        assert_eq!(polling.allowed_updates(), ["message", "callback_query"]);
        polling.run(shutdown).await.unwrap();

        let polls = get_updates_calls(&session);
        assert_eq!(polls[0].params.get("offset"), Some(&json!(-1)));
        assert_eq!(polls[1].params.get("offset"), Some(&json!(41)));
    }

    #[tokio::test]
    async fn test_updates_as_tasks_are_awaited() {
        let (_session, bot, shutdown) = session(vec![Ok(json!([
            text_update(1, "a"),
            text_update(2, "b"),
            text_update(3, "c"),
        ]))]);
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let dp = Dispatcher::new();
        dp.message().register(
            move || {
                let counter = counter.clone();
                async move {
                    tokio::task::yield_now().await;
                    *counter.lock() += 1;
                }
            },
            (),
        );
        let config = PollingConfig {
            handle_as_tasks: true,
            ..Default::default()
        };

        Polling::new(bot, dp, config).run(shutdown).await.unwrap();
        assert_eq!(*count.lock(), 3);
    }
}

//! Bot process orchestration.
//!
//! [`GramflowRuntime`] ties configuration, logging, the HTTP session, the
//! dispatcher and the polling loop together:
//!
//! 1. load and validate [`GramflowConfig`], initialize logging
//! 2. build a [`Bot`] over [`HttpSession`] and fetch its identity
//! 3. emit `startup`, poll until Ctrl+C or SIGTERM, emit `shutdown`
//!
//! ```rust,ignore
//! use gramflow_runtime::GramflowRuntime;
//!
//! let runtime = GramflowRuntime::builder()
//!     .config_file("gramflow.toml")
//!     .build()?;
//! runtime.dispatcher().include_router(&router)?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use gramflow_core::{Bot, TelegramApiServer};
use gramflow_framework::Dispatcher;
use gramflow_transport::HttpSession;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ConfigLoader, GramflowConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use crate::polling::Polling;

/// A configured bot process.
pub struct GramflowRuntime {
    config: GramflowConfig,
    dispatcher: Dispatcher,
}

impl GramflowRuntime {
    /// Loads configuration from the current directory, the user config
    /// directory and `GRAMFLOW_*` variables.
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, initializes logging and creates a dispatcher
    /// using the configured FSM strategy.
    pub fn from_config(config: GramflowConfig) -> RuntimeResult<Self> {
        let dispatcher = Dispatcher::builder()
            .strategy(config.fsm.strategy)
            .build();
        Self::with_dispatcher(config, dispatcher)
    }

    /// Like [`from_config`](Self::from_config) with a prepared dispatcher.
    /// `config.fsm` is not applied to it.
    pub fn with_dispatcher(config: GramflowConfig, dispatcher: Dispatcher) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            api_base = %config.bot.api_base,
            "Runtime initialized from configuration"
        );
        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &GramflowConfig {
        &self.config
    }

    /// The root dispatcher; include routers here before [`run`](Self::run).
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Creates the bot described by the `bot` section.
    pub fn bot(&self) -> RuntimeResult<Bot> {
        let bot_config = &self.config.bot;
        let mut api = TelegramApiServer::new(bot_config.api_base.clone());
        api.is_local = bot_config.local_api;
        let session = HttpSession::with_api(api, bot_config.request_timeout())?;
        Ok(Bot::new(bot_config.token.clone(), Arc::new(session))?)
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        let bot = self.bot()?;
        self.run_with(bot, wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let bot = self.bot()?;
        self.run_with(bot, shutdown).await
    }

    /// Runs `bot` until `shutdown` completes or polling fails.
    ///
    /// Shutdown handlers run and the session is closed in both cases.
    pub async fn run_with<F>(&self, bot: Bot, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let me = bot.me().await?;
        info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or_default(),
            "Bot identity loaded"
        );

        self.dispatcher.emit_startup(&bot).await?;

        let stop = CancellationToken::new();
        let polling = Polling::new(bot.clone(), self.dispatcher.clone(), self.config.polling.clone());
        let polling_run = polling.run(stop.clone());
        tokio::pin!(polling_run);

        let result = tokio::select! {
            biased;
            _ = shutdown => {
                stop.cancel();
                polling_run.await
            }
            result = &mut polling_run => result,
        };
        if let Err(err) = &result {
            warn!(error = %err, "Polling ended with an error");
        }

        let shutdown_result = self.dispatcher.emit_shutdown(&bot).await;
        bot.session().close().await;
        info!("Runtime stopped");

        result?;
        shutdown_result?;
        Ok(())
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(err) => warn!(error = %err, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => {
            warn!(error = %err, "Failed to listen for Ctrl+C, waiting forever");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder of a [`GramflowRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    dispatcher: Option<Dispatcher>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            dispatcher: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, below files and environment.
    pub fn merge(mut self, config: GramflowConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses a prepared dispatcher instead of building one from `fsm`.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn build(self) -> RuntimeResult<GramflowRuntime> {
        let config = self.config_loader.load()?;
        match self.dispatcher {
            Some(dispatcher) => GramflowRuntime::with_dispatcher(config, dispatcher),
            None => GramflowRuntime::from_config(config),
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use gramflow_core::{ApiError, ApiResult, ContentStream, Session, TelegramMethod};
    use gramflow_framework::fsm::FsmStrategy;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::config::ConfigError;
    use crate::error::RuntimeError;

    #[derive(Default)]
    struct IdleSession {
        api: TelegramApiServer,
        methods: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Session for IdleSession {
        fn api(&self) -> &TelegramApiServer {
            &self.api
        }

        async fn make_request(
            &self,
            _token: &str,
            method: &TelegramMethod,
            _timeout: Option<Duration>,
        ) -> ApiResult<Value> {
            self.methods.lock().push(method.name.to_string());
            match method.name.as_ref() {
                "getMe" => Ok(json!({"id": 42, "is_bot": true, "first_name": "Idle", "username": "idle_bot"})),
                _ => Ok(json!([])),
            }
        }

        async fn stream_content(
            &self,
            _url: &str,
            _timeout: Duration,
            _chunk_size: usize,
        ) -> ApiResult<ContentStream> {
            Err(ApiError::network("idle"))
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn config() -> GramflowConfig {
        let mut config = GramflowConfig::default();
        config.bot.token = "42:runtime-token".into();
        config.fsm.strategy = FsmStrategy::Chat;
        config
    }

    #[test]
    fn test_rejects_invalid_config() {
        let err = GramflowRuntime::from_config(GramflowConfig::default()).err().unwrap();
        assert!(matches!(err, RuntimeError::Config(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_dispatcher_uses_configured_strategy() {
        let runtime = GramflowRuntime::from_config(config()).unwrap();
        assert_eq!(runtime.dispatcher().strategy(), FsmStrategy::Chat);
        assert_eq!(runtime.bot().unwrap().id(), 42);
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let runtime = GramflowRuntime::from_config(config()).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        for name in ["startup", "shutdown"] {
            let events = events.clone();
            let observer = if name == "startup" {
                runtime.dispatcher().startup()
            } else {
                runtime.dispatcher().shutdown()
            };
            observer.register(move || {
                let events = events.clone();
                async move { events.lock().push(name) }
            });
        }

        let session = Arc::new(IdleSession::default());
        let bot = Bot::new("42:runtime-token", session.clone()).unwrap();
        runtime.run_with(bot, async {}).await.unwrap();

        assert_eq!(*events.lock(), ["startup", "shutdown"]);
        assert_eq!(session.methods.lock().first().map(String::as_str), Some("getMe"));
        assert!(session.closed.load(Ordering::SeqCst));
    }
}

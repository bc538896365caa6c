//! The root of a router tree.
//!
//! A [`Dispatcher`] is a [`Router`] (through `Deref`) that also owns the FSM
//! storage and the workflow data shared by every update. It installs two
//! outer middlewares on its own `update` observer, in this order:
//!
//! 1. [`ErrorsMiddleware`], turning handler failures into `error` events;
//! 2. [`FsmContextMiddleware`], injecting `state`, `raw_state` and
//!    `fsm_storage`.
//!
//! ```rust,ignore
//! let dp = Dispatcher::new();
//! dp.message().register(echo, ());
//! dp.include_router(&admin_router)?;
//!
//! let outcome = dp.feed_update(&bot, update).await?;
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use gramflow_core::{ApiError, Bot, Update, UpdateType};
use serde_json::Value;
use tower::Service;
use tracing::{Instrument, Level, debug, error, info, span};

use crate::context::{Data, keys};
use crate::error::{DispatchError, DispatchResult};
use crate::fsm::{BaseStorage, FsmContextMiddleware, FsmStrategy, MemoryStorage};
use crate::handler::Outcome;
use crate::middleware::ErrorsMiddleware;
use crate::router::Router;

/// Root router plus the per-process dispatch state.
///
/// Cheap to clone; clones share the router tree, the storage and the
/// workflow data.
#[derive(Clone)]
pub struct Dispatcher {
    router: Router,
    storage: Arc<dyn BaseStorage>,
    strategy: FsmStrategy,
    workflow_data: Data,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router.name())
            .field("strategy", &self.strategy)
            .field("workflow_data", &self.workflow_data)
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Dispatcher {
    type Target = Router;

    fn deref(&self) -> &Router {
        &self.router
    }
}

impl Dispatcher {
    /// A dispatcher over in-memory FSM storage with the default strategy.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn storage(&self) -> &Arc<dyn BaseStorage> {
        &self.storage
    }

    pub fn strategy(&self) -> FsmStrategy {
        self.strategy
    }

    pub fn workflow_data(&self) -> &Data {
        &self.workflow_data
    }

    /// Adds a value visible to every handler, filter and middleware.
    ///
    /// Only affects updates fed after the call on this handle and its
    /// future clones.
    pub fn insert_data<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: std::any::Any + Send + Sync,
    {
        self.workflow_data.insert(key, value);
    }

    fn base_data(&self, bot: &Bot) -> Data {
        let mut data = self.workflow_data.clone();
        data.insert(keys::BOT, bot.clone());
        data
    }

    /// Dispatches one update from `bot`.
    ///
    /// Skip and cancel signals that escape the tree count as unhandled.
    /// Errors no `error` handler took care of are logged and returned.
    pub async fn feed_update(&self, bot: &Bot, update: Update) -> DispatchResult<Outcome> {
        let update_id = update.update_id;
        let span = span!(Level::DEBUG, "feed_update", update_id, bot_id = bot.id());
        let started = Instant::now();

        let result = self
            .router
            .propagate_update(Arc::new(update), self.base_data(bot))
            .instrument(span)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                if outcome.is_handled() {
                    info!(update_id, elapsed_ms, bot_id = bot.id(), "Update is handled");
                } else {
                    info!(update_id, elapsed_ms, bot_id = bot.id(), "Update is not handled");
                }
                Ok(outcome)
            }
            Err(DispatchError::Skip | DispatchError::Cancel) => {
                debug!(update_id, "Update processing stopped by a control signal");
                Ok(Outcome::Unhandled)
            }
            Err(err) => {
                error!(update_id, elapsed_ms, error = %err, "Cause exception while processing update");
                Err(err)
            }
        }
    }

    /// Decodes a raw JSON update and dispatches it.
    pub async fn feed_raw_update(&self, bot: &Bot, update: Value) -> DispatchResult<Outcome> {
        let update: Update =
            serde_json::from_value(update).map_err(|e| ApiError::decode(e.to_string()))?;
        self.feed_update(bot, update).await
    }

    /// Runs the `startup` handlers of the whole tree.
    pub async fn emit_startup(&self, bot: &Bot) -> DispatchResult<()> {
        debug!(bot_id = bot.id(), "Emitting startup");
        self.router.emit_startup(&self.base_data(bot)).await
    }

    /// Runs the `shutdown` handlers of the whole tree, then closes the
    /// storage.
    pub async fn emit_shutdown(&self, bot: &Bot) -> DispatchResult<()> {
        debug!(bot_id = bot.id(), "Emitting shutdown");
        let result = self.router.emit_shutdown(&self.base_data(bot)).await;
        self.storage.close().await?;
        result
    }

    /// Update types some handler of the tree listens to.
    pub fn resolve_used_update_types(&self) -> Vec<UpdateType> {
        self.router.resolve_used_update_types()
    }

    /// Binds this dispatcher to `bot` as a [`tower::Service`].
    pub fn service(&self, bot: Bot) -> DispatchService {
        DispatchService {
            dispatcher: self.clone(),
            bot,
        }
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    name: Option<String>,
    storage: Option<Arc<dyn BaseStorage>>,
    strategy: FsmStrategy,
    workflow_data: Data,
}

impl DispatcherBuilder {
    /// Name of the root router. Defaults to `"dispatcher"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn storage(mut self, storage: Arc<dyn BaseStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn strategy(mut self, strategy: FsmStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn data<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: std::any::Any + Send + Sync,
    {
        self.workflow_data.insert(key, value);
        self
    }

    pub fn build(self) -> Dispatcher {
        let router = Router::new(self.name.unwrap_or_else(|| "dispatcher".to_string()));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        let outer = router.update().outer_middleware();
        outer.register(ErrorsMiddleware::new(&router));
        outer.register(FsmContextMiddleware::new(storage.clone(), self.strategy));

        Dispatcher {
            router,
            storage,
            strategy: self.strategy,
            workflow_data: self.workflow_data,
        }
    }
}

// ============================================================================
// DispatchService
// ============================================================================

/// A [`Dispatcher`] bound to one bot, usable as a tower service so drivers
/// can stack timeouts or concurrency limits around dispatch.
#[derive(Clone)]
pub struct DispatchService {
    dispatcher: Dispatcher,
    bot: Bot,
}

impl DispatchService {
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Service<Update> for DispatchService {
    type Response = Outcome;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<Outcome>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let bot = self.bot.clone();
        Box::pin(async move { dispatcher.feed_update(&bot, update).await })
    }
}

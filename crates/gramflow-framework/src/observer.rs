//! Per-event-type handler lists.
//!
//! Each [`Router`] owns one [`EventObserver`] per [`EventType`]. An observer
//! keeps its handlers in registration order and implements "first match
//! wins": the first handler whose filters accept is invoked, and a handler
//! that returns [`DispatchError::Skip`] defers to the next one.
//!
//! ```rust,ignore
//! router.message().register(start, Command::new(["start"]));
//!
//! router
//!     .message()
//!     .on(echo)
//!     .kwarg("text_startswith", "echo ")
//!     .flag("chat_action", "typing")
//!     .register()?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use serde_json::{Map, Value};
use tracing::trace;

use crate::context::{Data, keys};
use crate::error::{DispatchError, DispatchResult, FilterError};
use crate::event::{EventType, LifecycleEvent, TelegramEvent};
use crate::filters::{BoxedFilter, BoxedFilterFactory, FilterResult, IntoFilters, resolve_kwargs};
use crate::flags::{Flag, Flags};
use crate::handler::{Handler, HandlerObject, Outcome};
use crate::middleware::{BoxedMiddleware, MiddlewareManager, next_fn, wrap_middlewares};
use crate::router::{Router, RouterInner};
use crate::util::CowList;

// ============================================================================
// EventObserver
// ============================================================================

/// Ordered handlers of one event type on one router.
pub struct EventObserver {
    event_type: EventType,
    router: Weak<RouterInner>,
    handlers: CowList<Arc<HandlerObject>>,
    filters: CowList<BoxedFilter>,
    outer: MiddlewareManager,
    inner: MiddlewareManager,
    factories: CowList<BoxedFilterFactory>,
}

impl fmt::Debug for EventObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObserver")
            .field("event_type", &self.event_type)
            .field("handlers", &self.handlers.len())
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

impl EventObserver {
    pub(crate) fn new(event_type: EventType, router: Weak<RouterInner>) -> Self {
        Self {
            event_type,
            router,
            handlers: CowList::new(),
            filters: CowList::new(),
            outer: MiddlewareManager::new(),
            inner: MiddlewareManager::new(),
            factories: CowList::new(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Registers `handler` behind `filters` and returns it unchanged.
    pub fn register<H, T>(&self, handler: H, filters: impl IntoFilters) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register_object(HandlerObject::new(handler.clone(), filters.into_filters()));
        handler
    }

    /// Registers an already built handler object.
    pub fn register_object(&self, handler: HandlerObject) -> Arc<HandlerObject> {
        let handler = Arc::new(handler);
        trace!(
            event_type = %self.event_type,
            handler = handler.name(),
            "Registering handler"
        );
        self.handlers.push(handler.clone());
        handler
    }

    /// Starts a registration that also accepts keyword filters and flags.
    pub fn on<H, T>(&self, handler: H) -> HandlerBuilder<'_, H, T>
    where
        H: Handler<T>,
        T: 'static,
    {
        HandlerBuilder {
            observer: self,
            handler,
            filters: Vec::new(),
            kwargs: Map::new(),
            flags: Flags::new(),
            _marker: PhantomData,
        }
    }

    /// Adds observer-wide filters, checked before any handler.
    pub fn filter(&self, filters: impl IntoFilters) {
        for filter in filters.into_filters() {
            self.filters.push(filter);
        }
    }

    /// Middleware around the whole propagation of this event type.
    pub fn outer_middleware(&self) -> &MiddlewareManager {
        &self.outer
    }

    /// Middleware around the selected handler.
    pub fn middleware(&self) -> &MiddlewareManager {
        &self.inner
    }

    /// Binds a keyword filter factory. Binding the same instance twice is a
    /// no-op.
    pub fn bind_filter(&self, factory: BoxedFilterFactory) {
        if self
            .factories
            .snapshot()
            .iter()
            .any(|f| Arc::ptr_eq(f, &factory))
        {
            return;
        }
        self.factories.push(factory);
    }

    /// Factories bound here and on the same observer of every ancestor,
    /// furthest ancestor first, deduplicated by identity.
    pub fn resolve_factories(&self) -> Vec<BoxedFilterFactory> {
        let routers: Vec<Router> = match self.router() {
            Some(router) => router.chain_head().collect(),
            None => return self.factories.snapshot().to_vec(),
        };

        let mut resolved: Vec<BoxedFilterFactory> = Vec::new();
        for router in routers.iter().rev() {
            for factory in router.observer(self.event_type).factories.snapshot().iter() {
                if !resolved.iter().any(|f| Arc::ptr_eq(f, factory)) {
                    resolved.push(factory.clone());
                }
            }
        }
        resolved
    }

    /// Registered handlers in order.
    pub fn handlers(&self) -> Arc<Vec<Arc<HandlerObject>>> {
        self.handlers.snapshot()
    }

    pub fn has_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    fn router(&self) -> Option<Router> {
        self.router.upgrade().map(Router::from_inner)
    }

    /// Inner middleware of this event type from the root router down to
    /// this one.
    fn resolve_middlewares(&self) -> Vec<BoxedMiddleware> {
        let Some(router) = self.router() else {
            return self.inner.snapshot().to_vec();
        };
        let routers: Vec<Router> = router.chain_head().collect();
        routers
            .iter()
            .rev()
            .flat_map(|r| r.observer(self.event_type).inner.snapshot().to_vec())
            .collect()
    }

    /// Offers `event` to the handlers.
    ///
    /// Returns [`Outcome::Rejected`] when an observer-wide filter rejects,
    /// [`Outcome::Unhandled`] when no handler accepts, and the handler's
    /// response otherwise.
    pub async fn trigger(&self, event: TelegramEvent, mut data: Data) -> DispatchResult<Outcome> {
        for filter in self.filters.snapshot().iter() {
            match filter.check(&event, &data).await? {
                result if !result.is_accepted() => {
                    trace!(event_type = %self.event_type, filter = filter.name(), "Observer filter rejected event");
                    return Ok(Outcome::Rejected);
                }
                FilterResult::AcceptedWith(extra) => data.merge(extra),
                _ => {}
            }
        }

        let handlers = self.handlers.snapshot();
        if handlers.is_empty() {
            return Ok(Outcome::Unhandled);
        }
        let middlewares = self.resolve_middlewares();

        for handler in handlers.iter() {
            let mut scoped = data.clone();
            scoped.insert(keys::HANDLER, handler.clone());

            let (accepted, extra) = handler.check(&event, &scoped).await?;
            if !accepted {
                continue;
            }
            scoped.merge(extra);

            let target = handler.clone();
            let terminal = next_fn(move |event, data| {
                let target = target.clone();
                async move { target.call(event, data).await.map(Outcome::Handled) }
            });
            let chain = if middlewares.is_empty() {
                terminal
            } else {
                wrap_middlewares(&middlewares, terminal)
            };

            trace!(event_type = %self.event_type, handler = handler.name(), "Invoking handler");
            match chain(event.clone(), scoped).await {
                Err(DispatchError::Skip) => {
                    trace!(handler = handler.name(), "Handler skipped");
                    continue;
                }
                result => return result,
            }
        }
        Ok(Outcome::Unhandled)
    }
}

// ============================================================================
// HandlerBuilder
// ============================================================================

/// Registration with keyword filters and flags.
///
/// Keywords are resolved when [`register`](Self::register) is called, so
/// the observer must already be attached to its final parent for inherited
/// factories to apply.
pub struct HandlerBuilder<'a, H, T> {
    observer: &'a EventObserver,
    handler: H,
    filters: Vec<BoxedFilter>,
    kwargs: Map<String, Value>,
    flags: Flags,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> HandlerBuilder<'_, H, T>
where
    H: Handler<T>,
    T: 'static,
{
    pub fn filter(mut self, filters: impl IntoFilters) -> Self {
        self.filters.extend(filters.into_filters());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn flag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<Flag>) -> Self {
        let flag = flag.into();
        self.flags.insert(flag.name, flag.value);
        self
    }

    /// Resolves keyword filters and registers the handler.
    ///
    /// Resolved filters run after the explicit ones.
    pub fn register(self) -> Result<H, FilterError> {
        let mut filters = self.filters;
        if !self.kwargs.is_empty() {
            let factories = self.observer.resolve_factories();
            filters.extend(resolve_kwargs(&factories, &self.kwargs)?);
        }
        self.observer
            .register_object(HandlerObject::with_flags(self.handler.clone(), filters, self.flags));
        Ok(self.handler)
    }
}

// ============================================================================
// LifecycleObserver
// ============================================================================

/// Handlers of `startup` or `shutdown`.
///
/// Every handler runs; the first error stops the rest.
pub struct LifecycleObserver {
    kind: LifecycleEvent,
    handlers: CowList<Arc<HandlerObject>>,
}

impl LifecycleObserver {
    pub(crate) fn new(kind: LifecycleEvent) -> Self {
        Self {
            kind,
            handlers: CowList::new(),
        }
    }

    pub fn register<H, T>(&self, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers
            .push(Arc::new(HandlerObject::new(handler.clone(), Vec::new())));
        handler
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn trigger(&self, data: &Data) -> DispatchResult<()> {
        for handler in self.handlers.snapshot().iter() {
            handler
                .call(TelegramEvent::Lifecycle(self.kind), data.clone())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gramflow_core::Message;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::error::SkipHandler;
    use crate::filters::filter_fn;
    use crate::flags::get_flag;
    use crate::middleware::middleware_fn;

    fn message(text: &str) -> TelegramEvent {
        TelegramEvent::Message(Arc::new(Message {
            text: Some(text.into()),
            ..Default::default()
        }))
    }

    fn counting(counter: &Arc<AtomicUsize>, accept: bool) -> impl crate::filters::Filter {
        let counter = counter.clone();
        filter_fn(move |_event: &TelegramEvent, _data: &Data| {
            counter.fetch_add(1, Ordering::SeqCst);
            accept
        })
    }

    #[tokio::test]
    async fn test_first_accepting_handler_wins() {
        let router = Router::new("root");
        let observer = router.message();
        let checks = Arc::new(AtomicUsize::new(0));
        observer.register(|| async { "h1" }, counting(&checks, false));
        observer.register(|| async { "h2" }, counting(&checks, false));
        observer.register(|| async { "h3" }, counting(&checks, true));
        observer.register(|| async { "h4" }, counting(&checks, true));

        let outcome = observer.trigger(message("x"), Data::new()).await.unwrap();
        let response = outcome.response().unwrap();
        assert_eq!(response.downcast_ref::<&str>(), Some(&"h3"));
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_skip_moves_on() {
        let router = Router::new("root");
        let observer = router.message();
        observer.register(|| async { Err::<(), _>(SkipHandler) }, ());
        observer.register(|| async { "second" }, ());
        let outcome = observer.trigger(message("x"), Data::new()).await.unwrap();
        assert!(outcome.is_handled());

        let lonely = Router::new("lonely");
        lonely
            .message()
            .register(|| async { Err::<(), _>(SkipHandler) }, ());
        let outcome = lonely.message().trigger(message("x"), Data::new()).await.unwrap();
        assert!(matches!(outcome, Outcome::Unhandled));
    }

    #[tokio::test]
    async fn test_skip_does_not_leak_filter_data() {
        let router = Router::new("root");
        let observer = router.message();
        observer.register(
            || async { Err::<(), _>(SkipHandler) },
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new().with("leak", 1_i32)),
        );
        observer.register(
            |data: Data| async move { data.contains("leak") },
            (),
        );
        let outcome = observer.trigger(message("x"), Data::new()).await.unwrap();
        let response = outcome.response().unwrap();
        assert_eq!(response.downcast_ref::<bool>(), Some(&false));
    }

    #[tokio::test]
    async fn test_global_filter_veto() {
        let router = Router::new("root");
        let observer = router.message();
        let checks = Arc::new(AtomicUsize::new(0));
        observer.filter(filter_fn(|_: &TelegramEvent, _: &Data| false));
        observer.register(|| async {}, counting(&checks, true));

        let outcome = observer.trigger(message("x"), Data::new()).await.unwrap();
        assert!(matches!(outcome, Outcome::Rejected));
        assert_eq!(checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inner_middleware_from_root_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let root = Router::new("root");
        let child = Router::new("child");
        root.include_router(&child).unwrap();

        for (router, name) in [(&root, "root"), (&child, "child")] {
            let log = log.clone();
            router.message().middleware().register(middleware_fn(
                move |next: crate::middleware::Next, event, data| {
                    let log = log.clone();
                    async move {
                        log.lock().push(name);
                        next(event, data).await
                    }
                },
            ));
        }
        child.message().register(|| async {}, ());

        child.message().trigger(message("x"), Data::new()).await.unwrap();
        assert_eq!(*log.lock(), ["root", "child"]);
    }

    #[tokio::test]
    async fn test_builder_kwargs_and_flags() {
        let root = Router::new("root");
        let child = Router::new("child");
        root.include_router(&child).unwrap();

        child
            .message()
            .on(|| async { "echo" })
            .kwarg("text_startswith", "echo ")
            .flag("chat_action", "typing")
            .register()
            .unwrap();

        let handler = child.message().handlers()[0].clone();
        assert_eq!(handler.filters().len(), 1);
        assert_eq!(get_flag(&handler, "chat_action"), Some(json!("typing")));

        let hit = child.message().trigger(message("echo hi"), Data::new()).await.unwrap();
        assert!(hit.is_handled());
        let miss = child.message().trigger(message("hi"), Data::new()).await.unwrap();
        assert!(matches!(miss, Outcome::Unhandled));
    }

    #[test]
    fn test_unresolved_kwarg() {
        let router = Router::new("root");
        let Err(err) = router
            .message()
            .on(|| async {})
            .kwarg("colour", "red")
            .register()
        else {
            panic!("unknown keyword was accepted");
        };
        assert_eq!(
            err,
            FilterError::Unresolved {
                keys: vec!["colour".into()]
            }
        );
        assert!(!router.message().has_handlers());
    }

    #[test]
    fn test_inherited_factories_are_deduplicated() {
        let root = Router::new("root");
        let child = Router::new("child");
        root.include_router(&child).unwrap();
        let own = child.message().resolve_factories();
        assert_eq!(own.len(), 3);
    }

    #[tokio::test]
    async fn test_lifecycle_runs_all() {
        let router = Router::new("root");
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let count = count.clone();
            router.startup().register(move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        router.startup().trigger(&Data::new()).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

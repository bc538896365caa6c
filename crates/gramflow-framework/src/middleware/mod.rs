//! Middleware.
//!
//! A middleware receives the rest of the chain as [`Next`] and decides
//! whether, and how often, to continue it. Observers own two managers:
//!
//! - **outer** middleware wraps the whole propagation of an event type on
//!   one router, and runs even when no handler matches;
//! - **inner** middleware wraps the invocation of the selected handler only.
//!
//! Given `[m1, m2, m3]` registered in that order, the chain is
//! `m1(m2(m3(terminal)))`: `m1` sees the event first and the result last.
//!
//! ```rust,ignore
//! router.message().outer_middleware().register(middleware_fn(
//!     |next: Next, event: TelegramEvent, mut data: Data| async move {
//!         data.insert("started", Instant::now());
//!         next(event, data).await
//!     },
//! ));
//! ```

mod errors;

pub use errors::ErrorsMiddleware;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::Data;
use crate::error::DispatchResult;
use crate::event::TelegramEvent;
use crate::handler::Outcome;
use crate::util::CowList;

/// The remainder of a middleware chain.
pub type Next =
    Arc<dyn Fn(TelegramEvent, Data) -> BoxFuture<'static, DispatchResult<Outcome>> + Send + Sync>;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn call(&self, next: Next, event: TelegramEvent, data: Data) -> DispatchResult<Outcome>;
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A middleware backed by an async closure.
pub struct FnMiddleware<F> {
    f: F,
}

/// Creates a middleware from an async closure.
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Next, TelegramEvent, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<Outcome>> + Send + 'static,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Next, TelegramEvent, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<Outcome>> + Send + 'static,
{
    async fn call(&self, next: Next, event: TelegramEvent, data: Data) -> DispatchResult<Outcome> {
        (self.f)(next, event, data).await
    }
}

/// Erases an async closure into a [`Next`].
pub fn next_fn<F, Fut>(f: F) -> Next
where
    F: Fn(TelegramEvent, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<Outcome>> + Send + 'static,
{
    Arc::new(
        move |event: TelegramEvent, data: Data| -> BoxFuture<'static, DispatchResult<Outcome>> {
            Box::pin(f(event, data))
        },
    )
}

/// Composes `middlewares` around `terminal`, first one outermost.
pub fn wrap_middlewares(middlewares: &[BoxedMiddleware], terminal: Next) -> Next {
    middlewares.iter().rev().fold(terminal, |next, middleware| {
        let middleware = middleware.clone();
        next_fn(move |event, data| {
            let middleware = middleware.clone();
            let next = next.clone();
            async move { middleware.call(next, event, data).await }
        })
    })
}

// ============================================================================
// MiddlewareManager
// ============================================================================

/// Ordered middleware list of one observer scope.
#[derive(Default)]
pub struct MiddlewareManager {
    middlewares: CowList<BoxedMiddleware>,
}

impl MiddlewareManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware and returns its handle for [`unregister`](Self::unregister).
    pub fn register(&self, middleware: impl Middleware) -> BoxedMiddleware {
        let middleware: BoxedMiddleware = Arc::new(middleware);
        self.middlewares.push(middleware.clone());
        middleware
    }

    /// Appends an already shared middleware.
    pub fn register_boxed(&self, middleware: BoxedMiddleware) {
        self.middlewares.push(middleware);
    }

    /// Removes a middleware by identity. Returns whether it was registered.
    pub fn unregister(&self, middleware: &BoxedMiddleware) -> bool {
        self.middlewares
            .retain(|m| !Arc::ptr_eq(m, middleware))
            > 0
    }

    /// Current middlewares in registration order.
    pub fn snapshot(&self) -> Arc<Vec<BoxedMiddleware>> {
        self.middlewares.snapshot()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Composes the registered middlewares around `terminal`.
    pub fn wrap(&self, terminal: Next) -> Next {
        let middlewares = self.snapshot();
        if middlewares.is_empty() {
            return terminal;
        }
        wrap_middlewares(&middlewares, terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::event::LifecycleEvent;
    use crate::handler::Response;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> impl Middleware {
        let log = log.clone();
        middleware_fn(move |next: Next, event, data| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{name}:in"));
                let result = next(event, data).await;
                log.lock().push(format!("{name}:out"));
                result
            }
        })
    }

    #[tokio::test]
    async fn test_wrap_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = MiddlewareManager::new();
        manager.register(recording(&log, "m1"));
        manager.register(recording(&log, "m2"));

        let terminal_log = log.clone();
        let terminal = next_fn(move |_event, _data| {
            let log = terminal_log.clone();
            async move {
                log.lock().push("handler".to_string());
                Ok(Outcome::Handled(Response::empty()))
            }
        });

        let chain = manager.wrap(terminal);
        let outcome = chain(TelegramEvent::Lifecycle(LifecycleEvent::Startup), Data::new())
            .await
            .unwrap();
        assert!(outcome.is_handled());
        assert_eq!(
            *log.lock(),
            ["m1:in", "m2:in", "handler", "m2:out", "m1:out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_and_unregister() {
        let manager = MiddlewareManager::new();
        let blocker = manager.register(middleware_fn(|_next: Next, _event, _data| async {
            Ok(Outcome::Unhandled)
        }));
        let terminal = next_fn(|_event, _data| async { Ok(Outcome::Handled(Response::empty())) });

        let event = TelegramEvent::Lifecycle(LifecycleEvent::Startup);
        let outcome = manager.wrap(terminal.clone())(event.clone(), Data::new()).await.unwrap();
        assert!(!outcome.is_handled());

        assert!(manager.unregister(&blocker));
        assert!(manager.is_empty());
        let outcome = manager.wrap(terminal)(event, Data::new()).await.unwrap();
        assert!(outcome.is_handled());
    }
}

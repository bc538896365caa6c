//! Router tree.
//!
//! A [`Router`] owns one [`EventObserver`] per event type, the `startup` and
//! `shutdown` lifecycle observers, and an ordered list of child routers.
//! Routers are cheap handles; clones share the same node.
//!
//! # Propagation
//!
//! [`Router::propagate_update`] classifies an [`Update`], stores the update
//! and its ambient chat and user in the request data, and hands the
//! classified event to [`Router::propagate_event`]. A router first offers the
//! event to its own observer; when nothing handles it there, the children are
//! tried in attachment order and the first handled result wins.
//!
//! ```rust,ignore
//! let root = Router::new("root");
//! let admin = Router::new("admin");
//! admin.message().filter(is_admin);
//! admin.message().register(ban, Command::new(["ban"]));
//! root.include_router(&admin)?;
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use futures::future::BoxFuture;
use gramflow_core::{Update, UpdateType};
use tracing::{debug, trace, warn};

use crate::context::{Data, keys};
use crate::error::{DispatchResult, RouterError};
use crate::event::{EventContext, EventType, LifecycleEvent, TelegramEvent, classify};
use crate::filters::builtin_factories;
use crate::handler::Outcome;
use crate::middleware::next_fn;
use crate::observer::{EventObserver, LifecycleObserver};
use crate::util::CowList;

pub(crate) struct RouterInner {
    name: String,
    use_builtin_filters: bool,
    /// Indexed by `EventType as usize`.
    observers: Vec<EventObserver>,
    startup: LifecycleObserver,
    shutdown: LifecycleObserver,
    sub_routers: CowList<Router>,
    parent: OnceLock<Weak<RouterInner>>,
}

/// A node of the router tree.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// A non-owning router handle.
#[derive(Clone)]
pub struct WeakRouter {
    inner: Weak<RouterInner>,
}

impl WeakRouter {
    pub fn upgrade(&self) -> Option<Router> {
        self.inner.upgrade().map(Router::from_inner)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.inner.name)
            .field("sub_routers", &self.inner.sub_routers.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Router {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Router {}

macro_rules! observer_accessors {
    ($($name:ident => $kind:ident),+ $(,)?) => {
        $(
            #[doc = concat!("Observer of `", stringify!($name), "` events.")]
            pub fn $name(&self) -> &EventObserver {
                self.observer(EventType::$kind)
            }
        )+
    };
}

impl Router {
    /// Creates a router with the builtin keyword filters bound.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), true)
    }

    /// Creates a router without builtin keyword filters.
    ///
    /// Factories bound on an ancestor still apply once the router is
    /// attached.
    pub fn without_builtin_filters(name: impl Into<String>) -> Self {
        Self::build(name.into(), false)
    }

    fn build(name: String, use_builtin_filters: bool) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<RouterInner>| {
            let observers = EventType::ALL
                .iter()
                .map(|&kind| {
                    let observer = EventObserver::new(kind, weak.clone());
                    if use_builtin_filters {
                        for factory in builtin_factories(kind) {
                            observer.bind_filter(factory);
                        }
                    }
                    observer
                })
                .collect();
            RouterInner {
                name,
                use_builtin_filters,
                observers,
                startup: LifecycleObserver::new(LifecycleEvent::Startup),
                shutdown: LifecycleObserver::new(LifecycleEvent::Shutdown),
                sub_routers: CowList::new(),
                parent: OnceLock::new(),
            }
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<RouterInner>) -> Self {
        Self { inner }
    }

    pub fn downgrade(&self) -> WeakRouter {
        WeakRouter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The observer for `event_type`.
    pub fn observer(&self, event_type: EventType) -> &EventObserver {
        &self.inner.observers[event_type as usize]
    }

    observer_accessors! {
        update => Update,
        message => Message,
        edited_message => EditedMessage,
        channel_post => ChannelPost,
        edited_channel_post => EditedChannelPost,
        inline_query => InlineQuery,
        chosen_inline_result => ChosenInlineResult,
        callback_query => CallbackQuery,
        shipping_query => ShippingQuery,
        pre_checkout_query => PreCheckoutQuery,
        poll => Poll,
        poll_answer => PollAnswer,
        my_chat_member => MyChatMember,
        chat_member => ChatMember,
        chat_join_request => ChatJoinRequest,
        error => Error,
    }

    pub fn startup(&self) -> &LifecycleObserver {
        &self.inner.startup
    }

    pub fn shutdown(&self) -> &LifecycleObserver {
        &self.inner.shutdown
    }

    // ------------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------------

    pub fn parent(&self) -> Option<Router> {
        self.inner
            .parent
            .get()
            .and_then(Weak::upgrade)
            .map(Router::from_inner)
    }

    /// Child routers in attachment order.
    pub fn sub_routers(&self) -> Arc<Vec<Router>> {
        self.inner.sub_routers.snapshot()
    }

    /// This router followed by its ancestors up to the root.
    pub fn chain_head(&self) -> impl Iterator<Item = Router> + use<> {
        std::iter::successors(Some(self.clone()), Router::parent)
    }

    /// This router followed by all descendants, pre-order.
    pub fn chain_tail(&self) -> impl Iterator<Item = Router> + use<> {
        let mut routers = Vec::new();
        self.collect_tail(&mut routers);
        routers.into_iter()
    }

    fn collect_tail(&self, out: &mut Vec<Router>) {
        out.push(self.clone());
        for child in self.inner.sub_routers.snapshot().iter() {
            child.collect_tail(out);
        }
    }

    /// Attaches `child` below this router.
    ///
    /// Fails without changing either router when `child` is this router,
    /// already has a parent, or is an ancestor of this router.
    pub fn include_router(&self, child: &Router) -> Result<(), RouterError> {
        if self == child {
            return Err(RouterError::SelfReference(self.name().to_string()));
        }
        if let Some(parent) = child.parent() {
            return Err(RouterError::AlreadyAttached {
                child: child.name().to_string(),
                parent: parent.name().to_string(),
            });
        }
        if self.chain_head().any(|r| &r == child) {
            return Err(RouterError::Cycle {
                child: child.name().to_string(),
                parent: self.name().to_string(),
            });
        }

        let parent_name = || {
            child
                .parent()
                .map(|p| p.name().to_string())
                .unwrap_or_default()
        };
        if child.inner.parent.set(Arc::downgrade(&self.inner)).is_err() {
            return Err(RouterError::AlreadyAttached {
                child: child.name().to_string(),
                parent: parent_name(),
            });
        }
        self.inner.sub_routers.push(child.clone());

        if !child.inner.use_builtin_filters
            && EventType::ALL
                .iter()
                .any(|&kind| !self.observer(kind).resolve_factories().is_empty())
        {
            warn!(
                router = child.name(),
                parent = self.name(),
                "Router opted out of builtin filters, but its parent binds filter factories that will still apply"
            );
        }
        debug!(router = child.name(), parent = self.name(), "Included router");
        Ok(())
    }

    /// Attaches several routers in order, stopping at the first failure.
    pub fn include_routers<'a>(
        &self,
        children: impl IntoIterator<Item = &'a Router>,
    ) -> Result<(), RouterError> {
        for child in children {
            self.include_router(child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    /// Dispatches one update through the tree.
    ///
    /// The root `update` observer's outer middleware wraps the whole
    /// process. Updates without a modeled payload are offered to `update`
    /// handlers only and are otherwise unhandled.
    pub async fn propagate_update(&self, update: Arc<Update>, mut data: Data) -> DispatchResult<Outcome> {
        let context = classify(&update)
            .map(|(_, event)| EventContext::resolve(&event))
            .unwrap_or_default();
        data.insert(keys::EVENT_UPDATE, update.clone());
        if let Some(chat) = &context.chat {
            data.insert(keys::EVENT_CHAT, chat.clone());
        }
        if let Some(user) = &context.user {
            data.insert(keys::EVENT_FROM_USER, user.clone());
        }
        data.insert(keys::EVENT_CONTEXT, context);

        let router = self.clone();
        let terminal = next_fn(move |event, data| {
            let router = router.clone();
            async move { router.dispatch_update(event, data).await }
        });
        let chain = self.update().outer_middleware().wrap(terminal);
        chain(TelegramEvent::Update(update), data).await
    }

    async fn dispatch_update(&self, event: TelegramEvent, data: Data) -> DispatchResult<Outcome> {
        let TelegramEvent::Update(update) = event else {
            let event_type = event.event_type();
            return self.propagate_event(event_type, event, data).await;
        };
        match classify(&update) {
            Some((event_type, event)) => {
                trace!(update_id = update.update_id, %event_type, "Classified update");
                self.propagate_event(event_type, event, data).await
            }
            None => {
                debug!(update_id = update.update_id, "Update carries no known payload");
                self.propagate_unclassified(TelegramEvent::Update(update), data)
                    .await
            }
        }
    }

    fn propagate_unclassified(&self, event: TelegramEvent, data: Data) -> BoxFuture<'static, DispatchResult<Outcome>> {
        let router = self.clone();
        Box::pin(async move {
            let outcome = router.update().trigger(event.clone(), data.clone()).await?;
            if outcome.is_handled() {
                return Ok(outcome);
            }
            for child in router.sub_routers().iter() {
                let outcome = child
                    .propagate_unclassified(event.clone(), data.clone())
                    .await?;
                if outcome.is_handled() {
                    return Ok(outcome);
                }
            }
            Ok(Outcome::Unhandled)
        })
    }

    /// Dispatches an already classified event through this router and its
    /// children.
    ///
    /// Returns either [`Outcome::Handled`] or [`Outcome::Unhandled`]; a
    /// rejection by an observer filter counts as unhandled for the caller.
    pub fn propagate_event(
        &self,
        event_type: EventType,
        event: TelegramEvent,
        mut data: Data,
    ) -> BoxFuture<'static, DispatchResult<Outcome>> {
        let router = self.clone();
        Box::pin(async move {
            data.insert(keys::EVENT_ROUTER, router.clone());
            let target = router.clone();
            let terminal = next_fn(move |event, data| {
                let router = target.clone();
                async move { router.propagate_here(event_type, event, data).await }
            });
            let chain = router.observer(event_type).outer_middleware().wrap(terminal);
            chain(event, data).await
        })
    }

    async fn propagate_here(&self, event_type: EventType, event: TelegramEvent, data: Data) -> DispatchResult<Outcome> {
        let outcome = self
            .observer(event_type)
            .trigger(event.clone(), data.clone())
            .await?;
        if outcome.is_handled() {
            return Ok(outcome);
        }

        for child in self.sub_routers().iter() {
            let outcome = child
                .propagate_event(event_type, event.clone(), data.clone())
                .await?;
            if outcome.is_handled() {
                return Ok(outcome);
            }
        }
        Ok(Outcome::Unhandled)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Runs `startup` handlers, parent before children.
    pub async fn emit_startup(&self, data: &Data) -> DispatchResult<()> {
        for router in self.chain_tail() {
            trace!(router = router.name(), "Emitting startup");
            router.startup().trigger(data).await?;
        }
        Ok(())
    }

    /// Runs `shutdown` handlers, parent before children.
    pub async fn emit_shutdown(&self, data: &Data) -> DispatchResult<()> {
        for router in self.chain_tail() {
            trace!(router = router.name(), "Emitting shutdown");
            router.shutdown().trigger(data).await?;
        }
        Ok(())
    }

    /// Update types with at least one handler anywhere below this router,
    /// in classification order. Suitable for `allowed_updates`.
    pub fn resolve_used_update_types(&self) -> Vec<UpdateType> {
        let routers: Vec<Router> = self.chain_tail().collect();
        UpdateType::ALL
            .into_iter()
            .filter(|&kind| {
                routers
                    .iter()
                    .any(|r| r.observer(EventType::from(kind)).has_handlers())
            })
            .collect()
    }
}

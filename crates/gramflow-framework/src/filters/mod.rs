//! Filters decide whether a handler accepts an event.
//!
//! A filter returns a [`FilterResult`]: it rejects, accepts, or accepts and
//! contributes extra context data (the command filter injects the parsed
//! [`CommandObject`], for instance).
//!
//! ```rust,ignore
//! router.message().register(
//!     handler,
//!     (Command::new(["start"]), filter_fn(|event, _| event.text().is_some())),
//! );
//! ```

mod command;
mod exception;
mod factory;
mod logic;
mod state;
mod text;

pub use command::{Command, CommandObject, CommandPattern, case_insensitive};
pub use exception::{ExceptionMessageFilter, ExceptionTypeFilter};
pub use factory::{BoxedFilterFactory, FilterFactory, builtin_factories, resolve_kwargs};
pub use logic::{AndFilter, FilterExt, InvertFilter, OrFilter, and_f, invert_f, or_f};
pub use state::{StateFilter, StateSpec};
pub use text::{Text, TextMatch};

use std::any::type_name;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Data;
use crate::error::DispatchResult;
use crate::event::TelegramEvent;
use crate::flags::Flags;

/// Outcome of a filter check.
#[derive(Debug, Clone, Default)]
pub enum FilterResult {
    #[default]
    Rejected,
    Accepted,
    /// Accepted, adding entries to the handler's context.
    AcceptedWith(Data),
}

impl FilterResult {
    /// `AcceptedWith` an empty mapping counts as a rejection.
    pub fn is_accepted(&self) -> bool {
        match self {
            Self::Rejected => false,
            Self::Accepted => true,
            Self::AcceptedWith(data) => !data.is_empty(),
        }
    }
}

impl From<bool> for FilterResult {
    fn from(accepted: bool) -> Self {
        if accepted {
            Self::Accepted
        } else {
            Self::Rejected
        }
    }
}

/// An empty mapping rejects.
impl From<Data> for FilterResult {
    fn from(data: Data) -> Self {
        if data.is_empty() {
            Self::Rejected
        } else {
            Self::AcceptedWith(data)
        }
    }
}

impl From<Option<Data>> for FilterResult {
    fn from(data: Option<Data>) -> Self {
        data.map_or(Self::Rejected, Self::from)
    }
}

/// An async predicate over an event and its context.
#[async_trait]
pub trait Filter: Send + Sync + 'static {
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult>;

    /// Called once when a handler using this filter is registered.
    fn update_handler_flags(&self, _flags: &mut Flags) {}

    /// Name for logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// A shared, type-erased filter.
pub type BoxedFilter = Arc<dyn Filter>;

#[async_trait]
impl Filter for BoxedFilter {
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        (**self).check(event, data).await
    }

    fn update_handler_flags(&self, flags: &mut Flags) {
        (**self).update_handler_flags(flags);
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ============================================================================
// Closure filters
// ============================================================================

/// A filter backed by a synchronous closure.
pub struct FnFilter<F, R> {
    f: F,
    _marker: PhantomData<fn() -> R>,
}

/// Creates a filter from a closure returning anything convertible into
/// [`FilterResult`] (`bool`, `Data`, `Option<Data>`).
pub fn filter_fn<F, R>(f: F) -> FnFilter<F, R>
where
    F: Fn(&TelegramEvent, &Data) -> R + Send + Sync + 'static,
    R: Into<FilterResult> + 'static,
{
    FnFilter {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, R> Filter for FnFilter<F, R>
where
    F: Fn(&TelegramEvent, &Data) -> R + Send + Sync + 'static,
    R: Into<FilterResult> + 'static,
{
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        Ok((self.f)(event, data).into())
    }
}

/// A filter backed by an async closure.
pub struct AsyncFnFilter<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Creates a filter from an async closure.
///
/// ```rust,ignore
/// let is_admin = async_filter_fn(|event, data: Data| async move {
///     let Some(bot) = data.get_cloned::<Bot>(keys::BOT) else {
///         return Ok(false);
///     };
///     Ok::<_, DispatchError>(check_admin(&bot, &event).await?)
/// });
/// ```
pub fn async_filter_fn<F, Fut, R>(f: F) -> AsyncFnFilter<F, Fut>
where
    F: Fn(TelegramEvent, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<R>> + Send + 'static,
    R: Into<FilterResult>,
{
    AsyncFnFilter {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, R> Filter for AsyncFnFilter<F, Fut>
where
    F: Fn(TelegramEvent, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<R>> + Send + 'static,
    R: Into<FilterResult>,
{
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        Ok((self.f)(event.clone(), data.clone()).await?.into())
    }
}

// ============================================================================
// IntoFilters
// ============================================================================

/// Filter lists accepted at registration: `()`, one filter, a tuple of up
/// to six filters, or a `Vec<BoxedFilter>`.
pub trait IntoFilters {
    fn into_filters(self) -> Vec<BoxedFilter>;
}

impl IntoFilters for () {
    fn into_filters(self) -> Vec<BoxedFilter> {
        Vec::new()
    }
}

impl<F: Filter> IntoFilters for F {
    fn into_filters(self) -> Vec<BoxedFilter> {
        vec![Arc::new(self)]
    }
}

impl IntoFilters for Vec<BoxedFilter> {
    fn into_filters(self) -> Vec<BoxedFilter> {
        self
    }
}

macro_rules! impl_into_filters_tuple {
    ($($ty:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($ty: Filter,)+> IntoFilters for ($($ty,)+) {
            fn into_filters(self) -> Vec<BoxedFilter> {
                let ($($ty,)+) = self;
                vec![$(Arc::new($ty) as BoxedFilter,)+]
            }
        }
    };
}

impl_into_filters_tuple!(F1);
impl_into_filters_tuple!(F1, F2);
impl_into_filters_tuple!(F1, F2, F3);
impl_into_filters_tuple!(F1, F2, F3, F4);
impl_into_filters_tuple!(F1, F2, F3, F4, F5);
impl_into_filters_tuple!(F1, F2, F3, F4, F5, F6);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LifecycleEvent;

    fn event() -> TelegramEvent {
        TelegramEvent::Lifecycle(LifecycleEvent::Startup)
    }

    #[tokio::test]
    async fn test_fn_filter_conversions() {
        let yes = filter_fn(|_: &TelegramEvent, _: &Data| true);
        let with = filter_fn(|_: &TelegramEvent, _: &Data| Some(Data::new().with("k", 1u8)));
        let none = filter_fn(|_: &TelegramEvent, _: &Data| None::<Data>);

        assert!(matches!(yes.check(&event(), &Data::new()).await.unwrap(), FilterResult::Accepted));
        assert!(matches!(
            with.check(&event(), &Data::new()).await.unwrap(),
            FilterResult::AcceptedWith(_)
        ));
        assert!(matches!(none.check(&event(), &Data::new()).await.unwrap(), FilterResult::Rejected));
    }

    #[tokio::test]
    async fn test_empty_mapping_rejects() {
        let empty = filter_fn(|_: &TelegramEvent, _: &Data| Data::new());
        let empty_some = filter_fn(|_: &TelegramEvent, _: &Data| Some(Data::new()));
        assert!(!empty.check(&event(), &Data::new()).await.unwrap().is_accepted());
        assert!(!empty_some.check(&event(), &Data::new()).await.unwrap().is_accepted());
        assert!(!FilterResult::AcceptedWith(Data::new()).is_accepted());
    }

    #[tokio::test]
    async fn test_async_filter() {
        let filter = async_filter_fn(|_event, data: Data| async move {
            Ok::<_, crate::error::DispatchError>(data.contains("bot"))
        });
        let result = filter.check(&event(), &Data::new().with("bot", 1u8)).await.unwrap();
        assert!(result.is_accepted());
    }

    #[test]
    fn test_into_filters_tuple() {
        let a = filter_fn(|_: &TelegramEvent, _: &Data| true);
        let b = filter_fn(|_: &TelegramEvent, _: &Data| false);
        assert_eq!((a, b).into_filters().len(), 2);
        assert!(().into_filters().is_empty());
    }
}

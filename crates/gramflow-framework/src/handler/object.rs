use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::trace;

use super::response::Response;
use super::traits::Handler;
use crate::context::Data;
use crate::error::DispatchResult;
use crate::event::TelegramEvent;
use crate::extractor::ParamSpec;
use crate::filters::{BoxedFilter, FilterResult};
use crate::flags::Flags;

/// A type-erased handler callback.
pub type HandlerCallback =
    Arc<dyn Fn(TelegramEvent, Data) -> BoxFuture<'static, DispatchResult<Response>> + Send + Sync>;

/// One registered handler: callback, filters, flags and parameter spec.
///
/// Immutable after construction; observers share it as
/// `Arc<HandlerObject>` and insert it into the context under `handler`.
pub struct HandlerObject {
    callback: HandlerCallback,
    params: ParamSpec,
    filters: Vec<BoxedFilter>,
    flags: Flags,
    name: String,
}

impl fmt::Debug for HandlerObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerObject")
            .field("name", &self.name)
            .field("filters", &self.filters.len())
            .field("flags", &self.flags)
            .finish()
    }
}

impl HandlerObject {
    /// Wraps `handler` with its filters.
    pub fn new<H, T>(handler: H, filters: Vec<BoxedFilter>) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self::with_flags(handler, filters, Flags::new())
    }

    /// Wraps `handler` with its filters and explicit flags.
    ///
    /// Each filter may then add its own metadata to the flags.
    pub fn with_flags<H, T>(handler: H, filters: Vec<BoxedFilter>, flags: Flags) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        let params = <H as Handler<T>>::params();
        let callback: HandlerCallback = Arc::new(move |event: TelegramEvent, data: Data| {
            Handler::<T>::call(handler.clone(), event, data)
        });
        Self::from_callback(type_name::<H>(), callback, params, filters, flags)
    }

    /// Builds a handler from an already erased callback.
    pub fn from_callback(
        name: impl Into<String>,
        callback: HandlerCallback,
        params: ParamSpec,
        filters: Vec<BoxedFilter>,
        mut flags: Flags,
    ) -> Self {
        for filter in &filters {
            filter.update_handler_flags(&mut flags);
        }
        Self {
            callback,
            params,
            filters,
            flags,
            name: name.into(),
        }
    }

    /// Type name of the callback, for logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ParamSpec {
        &self.params
    }

    pub fn filters(&self) -> &[BoxedFilter] {
        &self.filters
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Runs the filters in order.
    ///
    /// Each filter sees `data` plus whatever the previous filters added. The
    /// first rejection returns `(false, empty)`; otherwise the data added by
    /// all filters is returned.
    pub async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<(bool, Data)> {
        let mut extra = Data::new();
        for filter in &self.filters {
            let result = if extra.is_empty() {
                filter.check(event, data).await?
            } else {
                filter.check(event, &data.merged(&extra)).await?
            };
            match result {
                result if !result.is_accepted() => {
                    trace!(handler = %self.name, filter = filter.name(), "Filter rejected event");
                    return Ok((false, Data::new()));
                }
                FilterResult::AcceptedWith(more) => extra.merge(more),
                _ => {}
            }
        }
        Ok((true, extra))
    }

    /// Invokes the callback with `data` narrowed to the declared keys.
    pub async fn call(&self, event: TelegramEvent, data: Data) -> DispatchResult<Response> {
        (self.callback)(event, self.params.narrow(data)).await
    }
}

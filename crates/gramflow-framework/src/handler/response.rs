//! Handler return values and dispatch outcomes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use gramflow_core::TelegramMethod;
use serde_json::Value;

use crate::error::{DispatchError, DispatchResult};

/// The value a handler produced.
///
/// Type-erased so handlers with different return types can share an
/// observer. Drivers inspect it with [`downcast_ref`](Self::downcast_ref),
/// e.g. to execute a returned [`TelegramMethod`].
#[derive(Clone, Default)]
pub struct Response {
    value: Option<Arc<dyn Any + Send + Sync>>,
}

impl Response {
    /// A response carrying nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A response carrying `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
        }
    }

    /// Whether the handler returned no value.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// The carried value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Result of offering an event to an observer or a router.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A handler ran and produced this response.
    Handled(Response),
    /// No handler matched.
    Unhandled,
    /// An observer-level filter vetoed the event before any handler ran.
    Rejected,
}

impl Outcome {
    /// Whether a handler ran.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    /// The handler response, if one ran.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Handled(r) => Some(r),
            _ => None,
        }
    }
}

/// Conversion of handler return values into a [`Response`].
pub trait IntoResponse: Send + 'static {
    fn into_response(self) -> DispatchResult<Response>;
}

impl IntoResponse for () {
    fn into_response(self) -> DispatchResult<Response> {
        Ok(Response::empty())
    }
}

macro_rules! impl_into_response_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoResponse for $ty {
                fn into_response(self) -> DispatchResult<Response> {
                    Ok(Response::new(self))
                }
            }
        )+
    };
}

impl_into_response_value!(
    String,
    &'static str,
    bool,
    i32,
    i64,
    u32,
    u64,
    usize,
    Value,
    TelegramMethod
);

impl IntoResponse for Response {
    fn into_response(self) -> DispatchResult<Response> {
        Ok(self)
    }
}

impl<T: IntoResponse> IntoResponse for Option<T> {
    fn into_response(self) -> DispatchResult<Response> {
        match self {
            Some(v) => v.into_response(),
            None => Ok(Response::empty()),
        }
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: Into<DispatchError> + Send + 'static,
{
    fn into_response(self) -> DispatchResult<Response> {
        self.map_err(Into::into)?.into_response()
    }
}

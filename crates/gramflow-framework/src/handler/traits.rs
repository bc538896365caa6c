use std::future::Future;

use futures::future::BoxFuture;

use super::response::{IntoResponse, Response};
use crate::context::Data;
use crate::error::DispatchResult;
use crate::event::TelegramEvent;
use crate::extractor::{FromContext, ParamSpec};

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for event handlers.
///
/// # Blanket Implementation
///
/// This trait is automatically implemented for async functions that:
/// - Take 0-16 parameters that implement [`FromContext`]
/// - Return a value implementing [`IntoResponse`]
///
/// The type parameter `T` only exists to tell the arities apart.
///
/// # Example
///
/// ```rust,ignore
/// async fn no_params() {}
/// async fn one_param(message: Message) -> &'static str { "ok" }
/// async fn fallible(message: Message, bot: Bot) -> Result<(), ApiError> {
///     bot.send_message(message.chat.id, "hi").await?;
///     Ok(())
/// }
/// ```
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// The context keys the handler reads.
    fn params() -> ParamSpec;

    /// Extracts the parameters and runs the handler.
    fn call(self, event: TelegramEvent, data: Data) -> BoxFuture<'static, DispatchResult<Response>>;
}

// ============================================================================
// Handler implementations for functions (Axum-style)
// ============================================================================

impl<F, Fut, R> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn params() -> ParamSpec {
        ParamSpec::default()
    }

    fn call(self, _event: TelegramEvent, _data: Data) -> BoxFuture<'static, DispatchResult<Response>> {
        Box::pin(async move { (self)().await.into_response() })
    }
}

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponse,
            $( $ty: FromContext, )*
        {
            fn params() -> ParamSpec {
                let mut spec = ParamSpec::default();
                $( $ty::declare(&mut spec); )*
                spec
            }

            fn call(self, event: TelegramEvent, data: Data) -> BoxFuture<'static, DispatchResult<Response>> {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_context(&event, &data)?;
                    )*

                    (self)($($ty,)*).await.into_response()
                })
            }
        }
    };
}

// Generate implementations for 1-16 parameters
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);

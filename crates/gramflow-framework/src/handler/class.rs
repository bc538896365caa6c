use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::response::{IntoResponse, Response};
use super::traits::Handler;
use crate::context::Data;
use crate::error::{DispatchResult, ExtractResult};
use crate::event::TelegramEvent;
use crate::extractor::ParamSpec;

/// A handler written as a type.
///
/// A fresh value is built from the event and the full context for every
/// invocation, then [`handle`](Self::handle) runs it.
///
/// ```rust,ignore
/// struct Greeter {
///     message: Message,
///     bot: Bot,
/// }
///
/// #[async_trait]
/// impl BaseHandler for Greeter {
///     type Output = Result<(), ApiError>;
///
///     fn from_event(event: TelegramEvent, data: Data) -> ExtractResult<Self> {
///         Ok(Self {
///             message: Message::from_context(&event, &data)?,
///             bot: Bot::from_context(&event, &data)?,
///         })
///     }
///
///     async fn handle(self) -> Self::Output {
///         self.bot.send_message(self.message.chat.id, "hello").await.map(|_| ())
///     }
/// }
///
/// router.message().register(HandlerClass::<Greeter>::new(), ());
/// ```
#[async_trait]
pub trait BaseHandler: Sized + Send + 'static {
    type Output: IntoResponse;

    /// Builds the handler for one event.
    fn from_event(event: TelegramEvent, data: Data) -> ExtractResult<Self>;

    async fn handle(self) -> Self::Output;
}

/// Marker separating [`HandlerClass`] from the function implementations.
pub struct ClassHandlerMarker;

/// Adapts a [`BaseHandler`] type into a [`Handler`].
pub struct HandlerClass<H> {
    _marker: PhantomData<fn() -> H>,
}

impl<H> HandlerClass<H> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<H> Default for HandlerClass<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for HandlerClass<H> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<H: BaseHandler> Handler<ClassHandlerMarker> for HandlerClass<H> {
    fn params() -> ParamSpec {
        let mut spec = ParamSpec::default();
        spec.accept_all();
        spec
    }

    fn call(self, event: TelegramEvent, data: Data) -> BoxFuture<'static, DispatchResult<Response>> {
        Box::pin(async move {
            let handler = H::from_event(event, data)?;
            handler.handle().await.into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LifecycleEvent;

    struct Echo {
        word: String,
    }

    #[async_trait]
    impl BaseHandler for Echo {
        type Output = String;

        fn from_event(_event: TelegramEvent, data: Data) -> ExtractResult<Self> {
            Ok(Self {
                word: crate::extractor::required(&data, "word")?,
            })
        }

        async fn handle(self) -> String {
            self.word.to_uppercase()
        }
    }

    #[tokio::test]
    async fn test_class_handler() {
        let data = Data::new().with("word", String::from("hi"));
        let event = TelegramEvent::Lifecycle(LifecycleEvent::Startup);
        let response = HandlerClass::<Echo>::new().call(event, data).await.unwrap();
        assert_eq!(response.downcast_ref::<String>().map(String::as_str), Some("HI"));
        assert!(<HandlerClass<Echo> as Handler<ClassHandlerMarker>>::params().accepts_all());
    }
}

//! Handler system.
//!
//! Handlers are plain async functions whose parameters implement
//! [`FromContext`](crate::extractor::FromContext), similar to Axum's handler
//! system, or types implementing [`BaseHandler`]. Both are stored as a
//! [`HandlerObject`] once registered.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn start(message: Message, bot: Bot) -> Result<(), ApiError> {
//!     bot.send_message(message.chat.id, "Welcome!").await?;
//!     Ok(())
//! }
//!
//! router.message().register(start, Command::new(["start"]));
//! ```

mod class;
mod object;
mod response;
mod traits;

pub use class::{BaseHandler, ClassHandlerMarker, HandlerClass};
pub use object::{HandlerCallback, HandlerObject};
pub use response::{IntoResponse, Outcome, Response};
pub use traits::Handler;

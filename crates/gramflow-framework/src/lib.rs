//! # gramflow framework
//!
//! The dispatch engine of gramflow: routers, observers, filters,
//! middleware, dependency injection, FSM and scenes.
//!
//! An update fed to the [`Dispatcher`] travels down the router tree:
//!
//! ```text
//! Dispatcher ── update observer (outer middleware: errors, fsm, ...)
//!     │
//!     ├─ classify → message / callback_query / ...
//!     │
//!     └─ Router "root" ── observer ── outer middleware ── filters ── handlers
//!            ├─ Router "admin" ── ...
//!            └─ Router "scene:Form" ── ...
//! ```
//!
//! The first handler whose filters accept the event wins, parents before
//! children, siblings in inclusion order.
//!
//! ## Features
//!
//! - `clap-args`: the [`CommandArgs`] extractor for clap-parsed command
//!   arguments.

#[cfg(feature = "clap-args")]
pub mod args;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod extractor;
pub mod filters;
pub mod flags;
pub mod fsm;
pub mod handler;
pub mod middleware;
pub mod observer;
pub mod router;
pub mod scene;
pub mod util;

#[cfg(test)]
mod test_utils;

pub use context::{Data, keys};
pub use dispatcher::{DispatchService, Dispatcher, DispatcherBuilder};
pub use error::{
    CancelHandler, DispatchError, DispatchResult, ExtractError, ExtractResult, FilterError,
    RouterError, SceneError, SkipHandler, StorageError,
};
pub use event::{ErrorEvent, EventContext, EventType, LifecycleEvent, TelegramEvent};
pub use extractor::{Dep, EventChat, EventFromUser, FromContext, HandlerFlags, RawState};
pub use filters::{Command, CommandObject, Filter, FilterExt, FilterResult, StateFilter, Text};
pub use flags::{FLAGS, Flags, get_flag};
pub use handler::{Handler, HandlerObject, IntoResponse, Outcome, Response};
pub use middleware::{Middleware, Next, middleware_fn};
pub use observer::{EventObserver, LifecycleObserver};
pub use router::Router;

#[cfg(feature = "clap-args")]
pub use args::CommandArgs;

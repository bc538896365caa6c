//! # Gramflow
//!
//! An asynchronous Telegram bot framework built around a tree of routers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌─────────────────────────────────────┐
//! │ Polling  │────▶│ Dispatcher │────▶│ Router "root"                       │
//! │ (Bot API)│     │  FSM, data │     │  message / callback_query / ... ──▶ handlers
//! └──────────┘     └────────────┘     │  ├─ Router "admin"                  │
//!                                     │  └─ Router "scene:Form"             │
//!                                     └─────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: configuration, logging and the long polling loop
//! - **Dispatcher**: root router plus FSM storage and shared data
//! - **Routers**: one observer per update type, nested depth-first
//! - **Handlers**: async functions whose parameters are extracted from the
//!   event and the context data
//! - **Scenes**: named conversation steps backed by the FSM
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gramflow::prelude::*;
//!
//! async fn start(message: Message) -> TelegramMethod {
//!     TelegramMethod::send_message(message.chat.id, "Hello!")
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = GramflowRuntime::new()?;
//!     runtime.dispatcher().message().register(start, Command::new(["start"]));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `clap-args`: the `CommandArgs` extractor

pub use gramflow_core as core;
pub use gramflow_framework as framework;
pub use gramflow_runtime as runtime;
pub use gramflow_transport as transport;

/// Commonly used types for writing a bot.
///
/// ```rust,ignore
/// use gramflow::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use gramflow_runtime::{GramflowConfig, GramflowRuntime, Polling};

    // Bot API
    pub use gramflow_core::{
        ApiError, Bot, CallbackQuery, Chat, Message, TelegramMethod, Update, UpdateType, User,
    };

    // Routing
    pub use gramflow_framework::{
        Data, DispatchError, DispatchResult, Dispatcher, EventType, Outcome, Router, SkipHandler,
        keys,
    };

    // Handlers and extractors
    pub use gramflow_framework::{
        CommandObject, Dep, EventChat, EventFromUser, FromContext, HandlerFlags, RawState,
    };

    // Filters
    pub use gramflow_framework::filters::{ExceptionMessageFilter, ExceptionTypeFilter};
    pub use gramflow_framework::{Command, Filter, FilterExt, FilterResult, StateFilter, Text};

    // Middleware
    pub use gramflow_framework::{Middleware, Next, middleware_fn};

    // FSM and scenes
    pub use gramflow_framework::fsm::{FsmContext, MemoryStorage, State, StatesGroup};
    pub use gramflow_framework::scene::{
        After, SceneBuilder, SceneConfig, SceneRegistry, SceneWizard, ScenesManager,
    };

    #[cfg(feature = "clap-args")]
    pub use gramflow_framework::CommandArgs;
}

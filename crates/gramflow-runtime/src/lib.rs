//! # Gramflow Runtime
//!
//! Everything needed to run a gramflow bot as a process:
//!
//! - [`config`]: layered configuration (`gramflow.toml`, profiles,
//!   `GRAMFLOW_*` environment variables)
//! - [`logging`]: `tracing-subscriber` setup driven by that configuration
//! - [`Polling`]: the long polling loop feeding a
//!   [`Dispatcher`](gramflow_framework::Dispatcher)
//! - [`GramflowRuntime`]: startup, polling until a signal, shutdown
//!
//! ```rust,ignore
//! use gramflow_runtime::GramflowRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = GramflowRuntime::new()?;
//!     runtime.dispatcher().include_router(&handlers::router())?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: the `json` log format

pub mod config;
pub mod error;
pub mod logging;
pub mod polling;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, GramflowConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use polling::Polling;
pub use runtime::{GramflowRuntime, RuntimeBuilder, wait_for_shutdown};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

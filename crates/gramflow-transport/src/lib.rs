//! # Gramflow Transport
//!
//! Network implementations of the [`Session`](gramflow_core::Session) trait.
//!
//! ## Features
//!
//! - `http-client` (default): [`HttpSession`] backed by `reqwest`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gramflow_core::Bot;
//! use gramflow_transport::HttpSession;
//!
//! let bot = Bot::new(token, Arc::new(HttpSession::new()?))?;
//! let me = bot.me().await?;
//! ```

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "http-client")]
pub use http::{DEFAULT_TIMEOUT, HttpSession};

//! # Gramflow Core
//!
//! Telegram Bot API foundation for the gramflow framework.
//!
//! This crate provides:
//! - A typed subset of the Bot API data model ([`Update`], [`Message`], ...)
//! - [`TelegramMethod`] calls and the [`ApiResponse`] envelope
//! - The [`Session`] transport trait
//! - The [`Bot`] handle that ties a token to a session
//!
//! The dispatch engine in `gramflow-framework` only reads the chat, user and
//! text accessors of these types; everything else is passed through untouched.

pub mod bot;
pub mod error;
pub mod method;
pub mod session;
pub mod types;

pub use bot::{Bot, DEFAULT_CHUNK_SIZE, validate_token};
pub use error::{ApiError, ApiResult};
pub use method::{ApiResponse, ResponseParameters, TelegramApiServer, TelegramMethod, decode_response};
pub use session::{ContentStream, Session};
pub use types::*;

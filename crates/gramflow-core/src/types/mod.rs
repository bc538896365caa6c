//! A subset of the Telegram Bot API data model.
//!
//! Only the fields the dispatch engine inspects are typed. Unknown fields of
//! [`Message`] and [`Update`] are preserved in their `extra` maps so nothing
//! is lost when a payload is forwarded or re-serialized.

mod chat;
mod member;
mod message;
mod query;
mod update;

pub use chat::{Chat, ChatType, User};
pub use member::{ChatJoinRequest, ChatMember, ChatMemberUpdated, Poll, PollAnswer, PollOption};
pub use message::{Message, MessageEntity};
pub use query::{CallbackQuery, ChosenInlineResult, InlineQuery, PreCheckoutQuery, ShippingQuery};
pub use update::{Update, UpdateType};

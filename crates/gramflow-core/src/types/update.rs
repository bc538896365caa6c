//! The incoming [`Update`] envelope and its classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat::User;
use super::member::{ChatJoinRequest, ChatMemberUpdated, Poll, PollAnswer};
use super::message::Message;
use super::query::{CallbackQuery, ChosenInlineResult, InlineQuery, PreCheckoutQuery, ShippingQuery};

// ============================================================================
// UpdateType
// ============================================================================

/// The sub-event kinds an [`Update`] may carry.
///
/// Variants are declared in classification priority order: when an update
/// carries more than one payload, the first one in this order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateType {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,
}

impl UpdateType {
    /// All update types in classification priority order.
    pub const ALL: [UpdateType; 14] = [
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::InlineQuery,
        Self::ChosenInlineResult,
        Self::CallbackQuery,
        Self::ShippingQuery,
        Self::PreCheckoutQuery,
        Self::Poll,
        Self::PollAnswer,
        Self::MyChatMember,
        Self::ChatMember,
        Self::ChatJoinRequest,
    ];

    /// The field name used by the Bot API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
            Self::ChatJoinRequest => "chat_join_request",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown update type '{s}'"))
    }
}

// ============================================================================
// Update
// ============================================================================

/// An incoming update.
///
/// At most one of the optional payloads is expected to be present. Payloads
/// this crate does not model stay available in [`extra`](Self::extra).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonic update identifier, used as the polling offset.
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<InlineQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_inline_result: Option<ChosenInlineResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_query: Option<ShippingQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_answer: Option<PollAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_chat_member: Option<ChatMemberUpdated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_member: Option<ChatMemberUpdated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_join_request: Option<ChatJoinRequest>,
    /// Fields of update kinds that are not modeled.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Update {
    /// The first populated payload kind in priority order, if any.
    pub fn update_type(&self) -> Option<UpdateType> {
        UpdateType::ALL.into_iter().find(|t| self.has(*t))
    }

    /// Whether the payload of kind `kind` is populated.
    pub fn has(&self, kind: UpdateType) -> bool {
        match kind {
            UpdateType::Message => self.message.is_some(),
            UpdateType::EditedMessage => self.edited_message.is_some(),
            UpdateType::ChannelPost => self.channel_post.is_some(),
            UpdateType::EditedChannelPost => self.edited_channel_post.is_some(),
            UpdateType::InlineQuery => self.inline_query.is_some(),
            UpdateType::ChosenInlineResult => self.chosen_inline_result.is_some(),
            UpdateType::CallbackQuery => self.callback_query.is_some(),
            UpdateType::ShippingQuery => self.shipping_query.is_some(),
            UpdateType::PreCheckoutQuery => self.pre_checkout_query.is_some(),
            UpdateType::Poll => self.poll.is_some(),
            UpdateType::PollAnswer => self.poll_answer.is_some(),
            UpdateType::MyChatMember => self.my_chat_member.is_some(),
            UpdateType::ChatMember => self.chat_member.is_some(),
            UpdateType::ChatJoinRequest => self.chat_join_request.is_some(),
        }
    }

    /// The sender of the payload, when the payload has one.
    pub fn from_user(&self) -> Option<&User> {
        if let Some(m) = self
            .message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or(self.channel_post.as_ref())
            .or(self.edited_channel_post.as_ref())
        {
            return m.from.as_ref();
        }
        self.inline_query
            .as_ref()
            .map(|q| &q.from)
            .or(self.chosen_inline_result.as_ref().map(|q| &q.from))
            .or(self.callback_query.as_ref().map(|q| &q.from))
            .or(self.shipping_query.as_ref().map(|q| &q.from))
            .or(self.pre_checkout_query.as_ref().map(|q| &q.from))
            .or(self.poll_answer.as_ref().and_then(|a| a.user.as_ref()))
            .or(self.my_chat_member.as_ref().map(|m| &m.from))
            .or(self.chat_member.as_ref().map(|m| &m.from))
            .or(self.chat_join_request.as_ref().map(|r| &r.from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_order() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 1,
            "callback_query": {"id": "q", "from": {"id": 7, "first_name": "A"}, "chat_instance": "x"},
            "edited_message": {"message_id": 3, "chat": {"id": 7, "type": "private"}, "date": 0}
        }))
        .unwrap();
        assert_eq!(update.update_type(), Some(UpdateType::EditedMessage));
    }

    #[test]
    fn test_unknown_payload_is_kept() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 9,
            "message_reaction": {"chat": {"id": 1, "type": "group"}}
        }))
        .unwrap();
        assert_eq!(update.update_type(), None);
        assert!(update.extra.contains_key("message_reaction"));
    }

    #[test]
    fn test_update_type_names() {
        for kind in UpdateType::ALL {
            assert_eq!(kind.as_str().parse::<UpdateType>(), Ok(kind));
        }
        assert!("business_message".parse::<UpdateType>().is_err());
    }
}

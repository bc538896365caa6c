//! Messages and their entities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat::{Chat, User};

/// A special span inside message text: a command, a mention, a URL...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity type, e.g. `bot_command`, `mention`, `url`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
}

/// A message.
///
/// Only the fields the framework reads are typed; everything else the Bot API
/// sends is kept in [`extra`](Self::extra).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier unique inside the chat.
    pub message_id: i64,
    /// Unix timestamp.
    #[serde(default)]
    pub date: i64,
    /// Conversation the message belongs to.
    pub chat: Chat,
    /// Sender, empty for messages sent to channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Sender chat, for messages sent on behalf of a chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_chat: Option<Chat>,
    /// Forum topic the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,
    /// Whether the message was sent to a forum topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_topic_message: Option<bool>,
    /// Business connection the message was received through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_connection_id: Option<String>,
    /// Text of a text message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Caption of a media message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Entities found in [`text`](Self::text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
    /// The message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    /// Untyped remainder of the payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Text of the message, falling back to its caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Thread identifier, only set when the message was sent to a forum topic.
    pub fn topic_thread_id(&self) -> Option<i64> {
        if self.is_topic_message.unwrap_or(false) {
            self.message_thread_id
        } else {
            None
        }
    }
}

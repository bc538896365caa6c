//! Polls, membership changes and join requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat::{Chat, User};

/// One answer option of a poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option text.
    pub text: String,
    /// Number of votes.
    #[serde(default)]
    pub voter_count: i64,
}

/// State of a poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    /// Unique identifier.
    pub id: String,
    /// Poll question.
    #[serde(default)]
    pub question: String,
    /// Answer options.
    #[serde(default)]
    pub options: Vec<PollOption>,
    /// Total number of users that voted.
    #[serde(default)]
    pub total_voter_count: i64,
    /// Whether the poll is closed.
    #[serde(default)]
    pub is_closed: bool,
    /// Whether the poll is anonymous.
    #[serde(default)]
    pub is_anonymous: bool,
}

/// A user's answer in a non-anonymous poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollAnswer {
    /// Poll identifier.
    pub poll_id: String,
    /// Chat that changed the answer, for anonymous voters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_chat: Option<Chat>,
    /// User that changed the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Chosen option indexes, empty when the vote was retracted.
    #[serde(default)]
    pub option_ids: Vec<i32>,
}

/// A chat member and their status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    /// `creator`, `administrator`, `member`, `restricted`, `left` or `kicked`.
    pub status: String,
    /// The member.
    pub user: User,
    /// Status specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A change of a chat member's status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    /// Chat the user belongs to.
    pub chat: Chat,
    /// Performer of the action.
    pub from: User,
    /// Unix timestamp of the change.
    #[serde(default)]
    pub date: i64,
    /// Previous membership.
    pub old_chat_member: ChatMember,
    /// New membership.
    pub new_chat_member: ChatMember,
}

/// A request to join a chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatJoinRequest {
    /// Chat the request was sent to.
    pub chat: Chat,
    /// User that sent the request.
    pub from: User,
    /// Private chat with the user, usable for five minutes.
    #[serde(default)]
    pub user_chat_id: i64,
    /// Unix timestamp of the request.
    #[serde(default)]
    pub date: i64,
    /// Bio of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

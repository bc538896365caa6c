use serde::{Deserialize, Serialize};

/// How the storage key is derived from the chat, user and topic of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsmStrategy {
    /// One state per user in each chat.
    #[default]
    UserInChat,
    /// One state per chat, shared by all its users.
    Chat,
    /// One state per user across all chats.
    GlobalUser,
    /// One state per user in each forum topic.
    UserInTopic,
    /// One state per forum topic.
    ChatTopic,
}

impl FsmStrategy {
    /// Maps `(chat_id, user_id, thread_id)` to the key components.
    pub fn apply(self, chat_id: i64, user_id: i64, thread_id: Option<i64>) -> (i64, i64, Option<i64>) {
        match self {
            Self::UserInChat => (chat_id, user_id, None),
            Self::Chat => (chat_id, chat_id, None),
            Self::GlobalUser => (user_id, user_id, None),
            Self::UserInTopic => (chat_id, user_id, thread_id),
            Self::ChatTopic => (chat_id, chat_id, thread_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        assert_eq!(FsmStrategy::UserInChat.apply(-1, 7, Some(3)), (-1, 7, None));
        assert_eq!(FsmStrategy::Chat.apply(-1, 7, Some(3)), (-1, -1, None));
        assert_eq!(FsmStrategy::GlobalUser.apply(-1, 7, Some(3)), (7, 7, None));
        assert_eq!(FsmStrategy::UserInTopic.apply(-1, 7, Some(3)), (-1, 7, Some(3)));
        assert_eq!(FsmStrategy::ChatTopic.apply(-1, 7, Some(3)), (-1, -1, Some(3)));
    }

    #[test]
    fn test_serde_names() {
        let strategy: FsmStrategy = serde_json::from_str("\"user_in_topic\"").unwrap();
        assert_eq!(strategy, FsmStrategy::UserInTopic);
        assert_eq!(serde_json::to_string(&FsmStrategy::default()).unwrap(), "\"user_in_chat\"");
    }
}

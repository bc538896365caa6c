//! Dispatchable events.
//!
//! An incoming [`Update`] is classified into exactly one [`TelegramEvent`]
//! variant. Routers own one observer per [`EventType`]; the variant decides
//! which observer sees the event.
//!
//! ```rust,ignore
//! let (event_type, event) = classify(&update).expect("known update kind");
//! let ctx = EventContext::resolve(&event);
//! ```

use std::fmt;
use std::sync::Arc;

use gramflow_core::{
    CallbackQuery, Chat, ChatJoinRequest, ChatMemberUpdated, ChosenInlineResult, InlineQuery,
    Message, Poll, PollAnswer, PreCheckoutQuery, ShippingQuery, Update, UpdateType, User,
};

use crate::error::DispatchError;

// ============================================================================
// EventType
// ============================================================================

/// Observer keys of a router.
///
/// The fourteen update sub-types plus the raw `update` observer and the
/// synthetic `error` observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Update,
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
    Error,
}

impl EventType {
    /// Every observer key of a router.
    pub const ALL: [EventType; 16] = [
        Self::Update,
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
        Self::Error,
    ];

    /// Observer name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Error => "error",
            other => other.update_type().map_or("unknown", |t| t.as_str()),
        }
    }

    /// The update sub-type this observer handles, if any.
    pub fn update_type(&self) -> Option<UpdateType> {
        Some(match self {
            Self::Update | Self::Error => return None,
            Self::Message => UpdateType::Message,
            Self::EditedMessage => UpdateType::EditedMessage,
            Self::ChannelPost => UpdateType::ChannelPost,
            Self::EditedChannelPost => UpdateType::EditedChannelPost,
            Self::InlineQuery => UpdateType::InlineQuery,
            Self::ChosenInlineResult => UpdateType::ChosenInlineResult,
            Self::CallbackQuery => UpdateType::CallbackQuery,
            Self::ShippingQuery => UpdateType::ShippingQuery,
            Self::PreCheckoutQuery => UpdateType::PreCheckoutQuery,
            Self::Poll => UpdateType::Poll,
            Self::PollAnswer => UpdateType::PollAnswer,
            Self::MyChatMember => UpdateType::MyChatMember,
            Self::ChatMember => UpdateType::ChatMember,
            Self::ChatJoinRequest => UpdateType::ChatJoinRequest,
        })
    }
}

impl From<UpdateType> for EventType {
    fn from(kind: UpdateType) -> Self {
        match kind {
            UpdateType::Message => Self::Message,
            UpdateType::EditedMessage => Self::EditedMessage,
            UpdateType::ChannelPost => Self::ChannelPost,
            UpdateType::EditedChannelPost => Self::EditedChannelPost,
            UpdateType::InlineQuery => Self::InlineQuery,
            UpdateType::ChosenInlineResult => Self::ChosenInlineResult,
            UpdateType::CallbackQuery => Self::CallbackQuery,
            UpdateType::ShippingQuery => Self::ShippingQuery,
            UpdateType::PreCheckoutQuery => Self::PreCheckoutQuery,
            UpdateType::Poll => Self::Poll,
            UpdateType::PollAnswer => Self::PollAnswer,
            UpdateType::MyChatMember => Self::MyChatMember,
            UpdateType::ChatMember => Self::ChatMember,
            UpdateType::ChatJoinRequest => Self::ChatJoinRequest,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TelegramEvent
// ============================================================================

/// The synthetic event offered to `error` observers.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// The update whose processing failed.
    pub update: Arc<Update>,
    /// The error raised while processing it.
    pub exception: DispatchError,
}

/// Router lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Startup,
    Shutdown,
}

/// An immutable, cheaply cloneable event.
#[derive(Debug, Clone)]
pub enum TelegramEvent {
    Update(Arc<Update>),
    Message(Arc<Message>),
    EditedMessage(Arc<Message>),
    ChannelPost(Arc<Message>),
    EditedChannelPost(Arc<Message>),
    InlineQuery(Arc<InlineQuery>),
    ChosenInlineResult(Arc<ChosenInlineResult>),
    CallbackQuery(Arc<CallbackQuery>),
    ShippingQuery(Arc<ShippingQuery>),
    PreCheckoutQuery(Arc<PreCheckoutQuery>),
    Poll(Arc<Poll>),
    PollAnswer(Arc<PollAnswer>),
    MyChatMember(Arc<ChatMemberUpdated>),
    ChatMember(Arc<ChatMemberUpdated>),
    ChatJoinRequest(Arc<ChatJoinRequest>),
    Error(Arc<ErrorEvent>),
    Lifecycle(LifecycleEvent),
}

impl TelegramEvent {
    /// The observer this event is dispatched to.
    ///
    /// Lifecycle events are not dispatched through observers; they report
    /// [`EventType::Update`].
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Update(_) | Self::Lifecycle(_) => EventType::Update,
            Self::Message(_) => EventType::Message,
            Self::EditedMessage(_) => EventType::EditedMessage,
            Self::ChannelPost(_) => EventType::ChannelPost,
            Self::EditedChannelPost(_) => EventType::EditedChannelPost,
            Self::InlineQuery(_) => EventType::InlineQuery,
            Self::ChosenInlineResult(_) => EventType::ChosenInlineResult,
            Self::CallbackQuery(_) => EventType::CallbackQuery,
            Self::ShippingQuery(_) => EventType::ShippingQuery,
            Self::PreCheckoutQuery(_) => EventType::PreCheckoutQuery,
            Self::Poll(_) => EventType::Poll,
            Self::PollAnswer(_) => EventType::PollAnswer,
            Self::MyChatMember(_) => EventType::MyChatMember,
            Self::ChatMember(_) => EventType::ChatMember,
            Self::ChatJoinRequest(_) => EventType::ChatJoinRequest,
            Self::Error(_) => EventType::Error,
        }
    }

    /// Short name for logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Lifecycle(LifecycleEvent::Startup) => "startup",
            Self::Lifecycle(LifecycleEvent::Shutdown) => "shutdown",
            other => other.event_type().as_str(),
        }
    }

    /// The message of any of the four message variants.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m)
            | Self::EditedMessage(m)
            | Self::ChannelPost(m)
            | Self::EditedChannelPost(m) => Some(m),
            _ => None,
        }
    }

    /// The callback query, if this is one.
    pub fn as_callback_query(&self) -> Option<&CallbackQuery> {
        match self {
            Self::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    /// Text a text filter would match against: message text or caption,
    /// callback data, or inline query text.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InlineQuery(q) => Some(&q.query),
            Self::CallbackQuery(q) => q.data.as_deref(),
            Self::Poll(p) => Some(&p.question),
            other => other.as_message().and_then(Message::text_or_caption),
        }
    }
}

/// Classifies an update by its first populated payload in priority order.
///
/// Returns `None` for updates whose payload is not modeled.
pub fn classify(update: &Update) -> Option<(EventType, TelegramEvent)> {
    let kind = update.update_type()?;
    let event = match kind {
        UpdateType::Message => TelegramEvent::Message(Arc::new(update.message.clone()?)),
        UpdateType::EditedMessage => {
            TelegramEvent::EditedMessage(Arc::new(update.edited_message.clone()?))
        }
        UpdateType::ChannelPost => TelegramEvent::ChannelPost(Arc::new(update.channel_post.clone()?)),
        UpdateType::EditedChannelPost => {
            TelegramEvent::EditedChannelPost(Arc::new(update.edited_channel_post.clone()?))
        }
        UpdateType::InlineQuery => TelegramEvent::InlineQuery(Arc::new(update.inline_query.clone()?)),
        UpdateType::ChosenInlineResult => {
            TelegramEvent::ChosenInlineResult(Arc::new(update.chosen_inline_result.clone()?))
        }
        UpdateType::CallbackQuery => {
            TelegramEvent::CallbackQuery(Arc::new(update.callback_query.clone()?))
        }
        UpdateType::ShippingQuery => {
            TelegramEvent::ShippingQuery(Arc::new(update.shipping_query.clone()?))
        }
        UpdateType::PreCheckoutQuery => {
            TelegramEvent::PreCheckoutQuery(Arc::new(update.pre_checkout_query.clone()?))
        }
        UpdateType::Poll => TelegramEvent::Poll(Arc::new(update.poll.clone()?)),
        UpdateType::PollAnswer => TelegramEvent::PollAnswer(Arc::new(update.poll_answer.clone()?)),
        UpdateType::MyChatMember => {
            TelegramEvent::MyChatMember(Arc::new(update.my_chat_member.clone()?))
        }
        UpdateType::ChatMember => TelegramEvent::ChatMember(Arc::new(update.chat_member.clone()?)),
        UpdateType::ChatJoinRequest => {
            TelegramEvent::ChatJoinRequest(Arc::new(update.chat_join_request.clone()?))
        }
    };
    Some((kind.into(), event))
}

// ============================================================================
// EventContext
// ============================================================================

/// Ambient chat and user of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    /// Chat the event happened in.
    pub chat: Option<Chat>,
    /// User that caused the event.
    pub user: Option<User>,
    /// Forum topic, when the event belongs to one.
    pub thread_id: Option<i64>,
    /// Business connection the event came through.
    pub business_connection_id: Option<String>,
}

impl EventContext {
    /// Resolves the ambient chat and user of `event`.
    pub fn resolve(event: &TelegramEvent) -> Self {
        fn from_message(m: &Message) -> EventContext {
            EventContext {
                chat: Some(m.chat.clone()),
                user: m.from.clone(),
                thread_id: m.topic_thread_id(),
                business_connection_id: m.business_connection_id.clone(),
            }
        }
        fn user_only(user: &User) -> EventContext {
            EventContext {
                user: Some(user.clone()),
                ..Default::default()
            }
        }

        match event {
            TelegramEvent::Message(m)
            | TelegramEvent::EditedMessage(m)
            | TelegramEvent::ChannelPost(m)
            | TelegramEvent::EditedChannelPost(m) => from_message(m),
            TelegramEvent::CallbackQuery(q) => match &q.message {
                Some(m) => EventContext {
                    chat: Some(m.chat.clone()),
                    user: Some(q.from.clone()),
                    thread_id: m.topic_thread_id(),
                    business_connection_id: None,
                },
                None => user_only(&q.from),
            },
            TelegramEvent::InlineQuery(q) => user_only(&q.from),
            TelegramEvent::ChosenInlineResult(r) => user_only(&r.from),
            TelegramEvent::ShippingQuery(q) => user_only(&q.from),
            TelegramEvent::PreCheckoutQuery(q) => user_only(&q.from),
            TelegramEvent::PollAnswer(a) => EventContext {
                chat: a.voter_chat.clone(),
                user: a.user.clone(),
                ..Default::default()
            },
            TelegramEvent::MyChatMember(m) | TelegramEvent::ChatMember(m) => EventContext {
                chat: Some(m.chat.clone()),
                user: Some(m.from.clone()),
                ..Default::default()
            },
            TelegramEvent::ChatJoinRequest(r) => EventContext {
                chat: Some(r.chat.clone()),
                user: Some(r.from.clone()),
                ..Default::default()
            },
            TelegramEvent::Poll(_)
            | TelegramEvent::Update(_)
            | TelegramEvent::Error(_)
            | TelegramEvent::Lifecycle(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_classify_message() {
        let u = update(json!({
            "update_id": 1,
            "message": {"message_id": 1, "date": 0, "chat": {"id": 10, "type": "private"},
                        "from": {"id": 7, "first_name": "A"}, "text": "hi"}
        }));
        let (kind, event) = classify(&u).unwrap();
        assert_eq!(kind, EventType::Message);
        assert_eq!(event.text(), Some("hi"));
        let ctx = EventContext::resolve(&event);
        assert_eq!(ctx.chat.map(|c| c.id), Some(10));
        assert_eq!(ctx.user.map(|u| u.id), Some(7));
    }

    #[test]
    fn test_classify_unknown() {
        let u = update(json!({"update_id": 2, "message_reaction": {}}));
        assert!(classify(&u).is_none());
    }

    #[test]
    fn test_callback_query_context() {
        let u = update(json!({
            "update_id": 3,
            "callback_query": {
                "id": "q", "from": {"id": 5, "first_name": "B"}, "chat_instance": "i", "data": "yes",
                "message": {"message_id": 2, "date": 0, "chat": {"id": -100, "type": "supergroup"},
                            "message_thread_id": 9, "is_topic_message": true}
            }
        }));
        let (kind, event) = classify(&u).unwrap();
        assert_eq!(kind, EventType::CallbackQuery);
        assert_eq!(event.text(), Some("yes"));
        let ctx = EventContext::resolve(&event);
        assert_eq!(ctx.chat.map(|c| c.id), Some(-100));
        assert_eq!(ctx.user.map(|u| u.id), Some(5));
        assert_eq!(ctx.thread_id, Some(9));
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::Update.as_str(), "update");
        assert_eq!(EventType::Error.as_str(), "error");
        assert_eq!(EventType::ChatJoinRequest.as_str(), "chat_join_request");
        for kind in UpdateType::ALL {
            assert_eq!(EventType::from(kind).update_type(), Some(kind));
        }
    }
}

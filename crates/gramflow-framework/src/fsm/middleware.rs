use std::sync::Arc;

use async_trait::async_trait;
use gramflow_core::Bot;
use tracing::trace;

use super::context::FsmContext;
use super::storage::{BaseStorage, StorageKey};
use super::strategy::FsmStrategy;
use crate::context::{Data, keys};
use crate::error::DispatchResult;
use crate::event::{EventContext, TelegramEvent};
use crate::handler::Outcome;
use crate::middleware::{Middleware, Next};

/// Injects `fsm_storage`, `state` and `raw_state`.
///
/// `state` and `raw_state` are only injected when the update has a chat or
/// a user and a bot is present in the data.
pub struct FsmContextMiddleware {
    storage: Arc<dyn BaseStorage>,
    strategy: FsmStrategy,
}

impl FsmContextMiddleware {
    pub fn new(storage: Arc<dyn BaseStorage>, strategy: FsmStrategy) -> Self {
        Self { storage, strategy }
    }

    /// The FSM context of the conversation described by `data`.
    pub fn resolve_context(&self, data: &Data) -> Option<FsmContext> {
        let bot = data.get::<Bot>(keys::BOT)?;
        let context = data.get::<EventContext>(keys::EVENT_CONTEXT)?;
        let chat_id = context.chat.as_ref().map(|c| c.id);
        let user_id = context.user.as_ref().map(|u| u.id);
        let (chat_id, user_id) = match (chat_id, user_id) {
            (Some(chat), Some(user)) => (chat, user),
            (Some(chat), None) => (chat, chat),
            (None, Some(user)) => (user, user),
            (None, None) => return None,
        };

        let (chat_id, user_id, thread_id) = self.strategy.apply(chat_id, user_id, context.thread_id);
        let mut key = StorageKey::new(bot.id(), chat_id, user_id).with_thread_id(thread_id);
        key.business_connection_id = context.business_connection_id.clone();
        Some(FsmContext::new(self.storage.clone(), key))
    }
}

#[async_trait]
impl Middleware for FsmContextMiddleware {
    async fn call(&self, next: Next, event: TelegramEvent, mut data: Data) -> DispatchResult<Outcome> {
        data.insert(keys::FSM_STORAGE, self.storage.clone());
        if let Some(context) = self.resolve_context(&data) {
            let state = context.get_state().await?;
            trace!(key = %context.key(), state = ?state, "Resolved FSM context");
            data.insert(keys::RAW_STATE, state);
            data.insert(keys::STATE, context);
        }
        next(event, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gramflow_core::{Chat, User};

    use crate::fsm::MemoryStorage;
    use crate::test_utils::test_bot;

    #[test]
    fn test_key_from_context() {
        let middleware = FsmContextMiddleware::new(Arc::new(MemoryStorage::new()), FsmStrategy::UserInChat);
        let context = EventContext {
            chat: Some(Chat {
                id: -100,
                ..Default::default()
            }),
            user: Some(User {
                id: 7,
                ..Default::default()
            }),
            ..Default::default()
        };
        let data = Data::new()
            .with(keys::BOT, test_bot())
            .with(keys::EVENT_CONTEXT, context);
        let fsm = middleware.resolve_context(&data).unwrap();
        assert_eq!(fsm.key().chat_id, -100);
        assert_eq!(fsm.key().user_id, 7);
        assert_eq!(fsm.key().bot_id, 42);

        let no_bot = Data::new().with(keys::EVENT_CONTEXT, EventContext::default());
        assert!(middleware.resolve_context(&no_bot).is_none());
    }

    #[test]
    fn test_key_for_half_known_events() {
        let middleware = FsmContextMiddleware::new(Arc::new(MemoryStorage::new()), FsmStrategy::UserInChat);
        let resolve = |context: EventContext| {
            let data = Data::new()
                .with(keys::BOT, test_bot())
                .with(keys::EVENT_CONTEXT, context);
            middleware.resolve_context(&data).map(|fsm| (fsm.key().chat_id, fsm.key().user_id))
        };

        let channel_post = EventContext {
            chat: Some(Chat {
                id: -200,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(resolve(channel_post), Some((-200, -200)));

        let inline_query = EventContext {
            user: Some(User {
                id: 9,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(resolve(inline_query), Some((9, 9)));
        assert_eq!(resolve(EventContext::default()), None);
    }
}

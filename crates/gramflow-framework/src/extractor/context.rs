//! Extractors backed by context data.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use gramflow_core::{Bot, Chat, User};

use super::{FromContext, ParamSpec, required};
use crate::context::{Data, keys};
use crate::error::ExtractResult;
use crate::event::{EventContext, TelegramEvent};
use crate::filters::CommandObject;
use crate::flags::Flags;
use crate::fsm::FsmContext;
use crate::handler::HandlerObject;
use crate::scene::{SceneWizard, ScenesManager};

/// Implements [`FromContext`] for a type stored as-is under a well-known key.
macro_rules! impl_data_extractor {
    ($($ty:ty => $key:expr),+ $(,)?) => {
        $(
            impl FromContext for $ty {
                fn declare(spec: &mut ParamSpec) {
                    spec.key($key);
                }

                fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
                    required(data, $key)
                }
            }
        )+
    };
}

impl_data_extractor! {
    Bot => keys::BOT,
    EventContext => keys::EVENT_CONTEXT,
    FsmContext => keys::STATE,
    CommandObject => keys::COMMAND,
    ScenesManager => keys::SCENES,
    SceneWizard => keys::WIZARD,
}

/// Ambient chat of the event (`event_chat`).
#[derive(Debug, Clone, PartialEq)]
pub struct EventChat(pub Chat);

impl Deref for EventChat {
    type Target = Chat;

    fn deref(&self) -> &Chat {
        &self.0
    }
}

impl FromContext for EventChat {
    fn declare(spec: &mut ParamSpec) {
        spec.key(keys::EVENT_CHAT);
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        required(data, keys::EVENT_CHAT).map(EventChat)
    }
}

/// Ambient user of the event (`event_from_user`).
#[derive(Debug, Clone, PartialEq)]
pub struct EventFromUser(pub User);

impl Deref for EventFromUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromContext for EventFromUser {
    fn declare(spec: &mut ParamSpec) {
        spec.key(keys::EVENT_FROM_USER);
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        required(data, keys::EVENT_FROM_USER).map(EventFromUser)
    }
}

/// Current FSM state name (`raw_state`); `None` when no state is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawState(pub Option<String>);

impl FromContext for RawState {
    fn declare(spec: &mut ParamSpec) {
        spec.key(keys::RAW_STATE);
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        required(data, keys::RAW_STATE).map(RawState)
    }
}

/// Flags of the handler being invoked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerFlags(pub Flags);

impl FromContext for HandlerFlags {
    fn declare(spec: &mut ParamSpec) {
        spec.key(keys::HANDLER);
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        let handler: Arc<HandlerObject> = required(data, keys::HANDLER)?;
        Ok(HandlerFlags(handler.flags().clone()))
    }
}

// ============================================================================
// User-defined keys
// ============================================================================

/// A typed name for a user-defined context entry.
///
/// Declare one with [`context_key!`](crate::context_key) and request the
/// value with [`Dep`].
pub trait ContextKey: Send + 'static {
    /// The context key.
    const KEY: &'static str;
    /// Type of the stored value.
    type Value: Clone + Send + Sync + 'static;
}

/// A user-defined context value.
///
/// ```rust,ignore
/// context_key!(pub Database: Arc<Pool> = "db");
///
/// async fn handler(message: Message, db: Dep<Database>) {
///     db.query(..).await;
/// }
/// ```
pub struct Dep<K: ContextKey> {
    value: K::Value,
    _key: PhantomData<fn() -> K>,
}

impl<K: ContextKey> Dep<K> {
    /// Consumes the extractor and returns the value.
    pub fn into_inner(self) -> K::Value {
        self.value
    }
}

impl<K: ContextKey> Deref for Dep<K> {
    type Target = K::Value;

    fn deref(&self) -> &K::Value {
        &self.value
    }
}

impl<K: ContextKey> Clone for Dep<K> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _key: PhantomData,
        }
    }
}

impl<K: ContextKey> FromContext for Dep<K> {
    fn declare(spec: &mut ParamSpec) {
        spec.key(K::KEY);
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        Ok(Self {
            value: required(data, K::KEY)?,
            _key: PhantomData,
        })
    }
}

/// Declares a [`ContextKey`].
///
/// ```rust,ignore
/// context_key!(pub ChatId: i64 = "chat_id");
/// ```
#[macro_export]
macro_rules! context_key {
    ($vis:vis $name:ident : $value:ty = $key:literal) => {
        $vis struct $name;

        impl $crate::extractor::ContextKey for $name {
            const KEY: &'static str = $key;
            type Value = $value;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LifecycleEvent;

    crate::context_key!(ChatId: i64 = "chat_id");

    fn event() -> TelegramEvent {
        TelegramEvent::Lifecycle(LifecycleEvent::Startup)
    }

    #[test]
    fn test_dep() {
        let data = Data::new().with("chat_id", 42i64);
        let dep = Dep::<ChatId>::from_context(&event(), &data).unwrap();
        assert_eq!(*dep, 42);

        let mut spec = ParamSpec::default();
        Dep::<ChatId>::declare(&mut spec);
        assert_eq!(spec.keys(), ["chat_id"]);
    }

    #[test]
    fn test_event_chat() {
        let chat = Chat {
            id: 7,
            ..Default::default()
        };
        let data = Data::new().with(keys::EVENT_CHAT, chat);
        assert_eq!(EventChat::from_context(&event(), &data).unwrap().id, 7);
        assert!(EventFromUser::from_context(&event(), &data).is_err());
        assert!(
            Option::<EventFromUser>::from_context(&event(), &data)
                .unwrap()
                .is_none()
        );
    }
}

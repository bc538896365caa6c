//! Scenes.
//!
//! A scene is a named FSM state with its own [`Router`](crate::router::Router).
//! Every observer of that router only accepts events while the conversation
//! is in the scene's state, so the scene's handlers are ordinary handlers
//! gated by a [`StateFilter`](crate::filters::StateFilter).
//!
//! Transitions go through the [`ScenesManager`] injected as `scenes`, or the
//! [`SceneWizard`] injected as `wizard` into the handlers of the active
//! scene:
//!
//! ```rust,ignore
//! let quiz = SceneBuilder::new("quiz")
//!     .on_enter(EventType::Message, ask_first_question)
//!     .handler(EventType::Message, check_answer, ())
//!     .handler_after(EventType::Message, give_up, Command::new(["stop"]), After::exit())
//!     .on_exit(EventType::Message, show_score)
//!     .build();
//!
//! let registry = SceneRegistry::new(&dispatcher);
//! registry.add(quiz.clone())?;
//! dispatcher
//!     .message()
//!     .register(quiz.as_handler(), Command::new(["quiz"]));
//! ```
//!
//! # History
//!
//! Entering a scene from another one records the previous scene and its
//! data in a [`HistoryManager`]; [`ScenesManager::back`] returns to it.
//!
//! # Concurrency
//!
//! Transitions are sequences of storage reads and writes. Two transitions
//! for the same conversation must not run concurrently; the polling driver
//! processes updates one at a time.

mod builder;
mod history;
mod manager;
mod registry;
mod wizard;

pub use builder::{After, EnterScene, EnterSceneMarker, Scene, SceneAction, SceneBuilder, SceneConfig};
pub use history::{DEFAULT_HISTORY_SIZE, HISTORY_DESTINY, HistoryEntry, HistoryManager};
pub use manager::ScenesManager;
pub use registry::SceneRegistry;
pub use wizard::SceneWizard;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use gramflow_core::{Chat, Message};
    use parking_lot::Mutex;

    use crate::context::Data;
    use crate::error::{DispatchError, SceneError, StorageError, StorageResult};
    use crate::event::{EventType, TelegramEvent};
    use crate::fsm::{BaseStorage, FsmContext, MemoryStorage, StorageData, StorageKey};
    use crate::router::Router;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logged(name: &'static str, log: &Log) -> Arc<Scene> {
        let on = |action: &'static str| {
            let log = log.clone();
            move || {
                let log = log.clone();
                async move { log.lock().push(format!("{name}-{action}")) }
            }
        };
        SceneBuilder::new(name)
            .on_enter(EventType::Message, on("enter"))
            .on_leave(EventType::Message, on("leave"))
            .on_exit(EventType::Message, on("exit"))
            .build()
    }

    fn manager(registry: &SceneRegistry) -> ScenesManager {
        let event = TelegramEvent::Message(Arc::new(Message {
            chat: Chat {
                id: 1,
                ..Default::default()
            },
            ..Default::default()
        }));
        let state = FsmContext::new(Arc::new(MemoryStorage::new()), StorageKey::new(42, 1, 1));
        ScenesManager::new(registry.clone(), EventType::Message, event, state, Data::new())
    }

    fn setup(root: &Router, log: &Log) -> (SceneRegistry, ScenesManager) {
        let registry = SceneRegistry::new(root);
        registry
            .add_all([logged("SceneA", log), logged("SceneB", log)])
            .unwrap();
        let manager = manager(&registry);
        (registry, manager)
    }

    #[tokio::test]
    async fn test_enter_leave_back() {
        let log = Log::default();
        let root = Router::new("root");
        let (_registry, scenes) = setup(&root, &log);

        scenes.enter("SceneA", Data::new()).await.unwrap();
        assert!(scenes.history().all().await.unwrap().is_empty());

        scenes.enter("SceneB", Data::new()).await.unwrap();
        assert_eq!(*log.lock(), ["SceneA-enter", "SceneA-leave", "SceneB-enter"]);
        assert_eq!(scenes.state().get_state().await.unwrap().as_deref(), Some("SceneB"));
        assert_eq!(scenes.history().all().await.unwrap().len(), 1);

        scenes.back(Data::new()).await.unwrap();
        assert_eq!(scenes.state().get_state().await.unwrap().as_deref(), Some("SceneA"));
        assert!(scenes.history().all().await.unwrap().is_empty());
        assert_eq!(log.lock().last().map(String::as_str), Some("SceneA-enter"));
    }

    #[tokio::test]
    async fn test_back_without_history_exits() {
        let log = Log::default();
        let root = Router::new("root");
        let (_registry, scenes) = setup(&root, &log);

        scenes.enter("SceneA", Data::new()).await.unwrap();
        scenes.back(Data::new()).await.unwrap();
        assert_eq!(*log.lock(), ["SceneA-enter", "SceneA-exit"]);
        assert_eq!(scenes.state().get_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_enter_restores_state() {
        let log = Log::default();
        let root = Router::new("root");
        let (registry, scenes) = setup(&root, &log);
        registry
            .add(
                SceneBuilder::new("Broken")
                    .on_enter(EventType::Message, || async {
                        Err::<(), _>(DispatchError::msg("nope"))
                    })
                    .build(),
            )
            .unwrap();

        scenes.enter("SceneA", Data::new()).await.unwrap();
        let mut data = StorageData::new();
        data.insert("step".into(), 1.into());
        scenes.state().set_data(data.clone()).await.unwrap();

        let err = scenes.enter("Broken", Data::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(scenes.state().get_state().await.unwrap().as_deref(), Some("SceneA"));
        assert_eq!(scenes.state().get_data().await.unwrap(), data);
        assert!(scenes.history().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_errors() {
        let log = Log::default();
        let root = Router::new("root");
        let (registry, scenes) = setup(&root, &log);

        let err = registry.add(logged("SceneA", &log)).unwrap_err();
        assert!(matches!(err, SceneError::Duplicate(name) if name == "SceneA"));

        let err = scenes.enter("Missing", Data::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Scene(SceneError::NotFound(_))));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_exit_clears_history() {
        let log = Log::default();
        let root = Router::new("root");
        let (_registry, scenes) = setup(&root, &log);

        scenes.enter("SceneA", Data::new()).await.unwrap();
        scenes.enter("SceneB", Data::new()).await.unwrap();
        scenes.exit(Data::new()).await.unwrap();

        assert_eq!(log.lock().last().map(String::as_str), Some("SceneB-exit"));
        assert_eq!(scenes.state().get_state().await.unwrap(), None);
        assert!(scenes.history().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wizard_sees_kwargs() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let root = Router::new("root");
        let registry = SceneRegistry::new(&root);
        registry
            .add(
                SceneBuilder::new("Form")
                    .on_enter(EventType::Message, move |wizard: SceneWizard, data: Data| {
                        let sink = sink.clone();
                        async move {
                            *sink.lock() = Some((wizard.scene().name().to_string(), data.get_cloned::<u8>("step")));
                        }
                    })
                    .build(),
            )
            .unwrap();

        let scenes = manager(&registry);
        scenes
            .enter("Form", Data::new().with("step", 3u8))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), Some(("Form".to_string(), Some(3))));
    }

    struct FlakyStorage {
        inner: MemoryStorage,
        failing: Arc<AtomicBool>,
    }

    impl FlakyStorage {
        fn check(&self) -> StorageResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("unavailable".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BaseStorage for FlakyStorage {
        async fn set_state(&self, key: &StorageKey, state: Option<String>) -> StorageResult<()> {
            self.check()?;
            self.inner.set_state(key, state).await
        }

        async fn get_state(&self, key: &StorageKey) -> StorageResult<Option<String>> {
            self.inner.get_state(key).await
        }

        async fn set_data(&self, key: &StorageKey, data: StorageData) -> StorageResult<()> {
            self.check()?;
            self.inner.set_data(key, data).await
        }

        async fn get_data(&self, key: &StorageKey) -> StorageResult<StorageData> {
            self.inner.get_data(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_enter_error() {
        let failing = Arc::new(AtomicBool::new(false));
        let trip = failing.clone();
        let root = Router::new("root");
        let registry = SceneRegistry::new(&root);
        registry
            .add(
                SceneBuilder::new("Broken")
                    .on_enter(EventType::Message, move || {
                        let trip = trip.clone();
                        async move {
                            trip.store(true, Ordering::SeqCst);
                            Err::<(), _>(DispatchError::msg("enter failed"))
                        }
                    })
                    .build(),
            )
            .unwrap();

        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
            failing,
        });
        let state = FsmContext::new(storage, StorageKey::new(42, 1, 1));
        let event = TelegramEvent::Message(Arc::new(Message::default()));
        let scenes = ScenesManager::new(registry, EventType::Message, event, state, Data::new());

        let err = scenes.enter("Broken", Data::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "enter failed");
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::manager::ScenesManager;
use super::wizard::SceneWizard;
use crate::context::{Data, keys};
use crate::error::{DispatchResult, ExtractError};
use crate::event::{EventType, TelegramEvent};
use crate::extractor::{FromContext, ParamSpec};
use crate::filters::{IntoFilters, StateFilter};
use crate::flags::Flags;
use crate::handler::{Handler, HandlerCallback, HandlerObject, Outcome, Response};
use crate::middleware::{Middleware, Next};
use crate::router::Router;

/// Scene lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneAction {
    Enter,
    Leave,
    Exit,
    Back,
}

/// Transition performed after a scene handler returns successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum After {
    Exit,
    Back,
    Goto(String),
}

impl After {
    pub fn exit() -> Self {
        Self::Exit
    }

    pub fn back() -> Self {
        Self::Back
    }

    pub fn goto(scene: impl Into<String>) -> Self {
        Self::Goto(scene.into())
    }
}

/// Scene behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneConfig {
    /// Clear the FSM data when the scene is entered.
    pub reset_data_on_enter: bool,
    /// Forget the history when the scene is entered.
    pub reset_history_on_enter: bool,
    /// Let callback queries reach the scene whatever the current state.
    pub callback_query_without_state: bool,
}

type ActionMap = HashMap<SceneAction, HashMap<EventType, Arc<HandlerObject>>>;

/// A compiled scene.
pub struct Scene {
    name: String,
    router: Router,
    actions: ActionMap,
    config: SceneConfig,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// The state name of the scene.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The `action` handler for `event_type`, if declared.
    pub fn action(&self, action: SceneAction, event_type: EventType) -> Option<&Arc<HandlerObject>> {
        self.actions.get(&action)?.get(&event_type)
    }

    /// A handler that enters this scene, for registration on other routers.
    pub fn as_handler(&self) -> EnterScene {
        EnterScene {
            scene: self.name.clone(),
        }
    }
}

/// Handler returned by [`Scene::as_handler`].
#[derive(Debug, Clone)]
pub struct EnterScene {
    scene: String,
}

/// [`Handler`] marker of [`EnterScene`].
pub struct EnterSceneMarker;

impl Handler<EnterSceneMarker> for EnterScene {
    fn params() -> ParamSpec {
        let mut spec = ParamSpec::default();
        ScenesManager::declare(&mut spec);
        spec
    }

    fn call(self, event: TelegramEvent, data: Data) -> BoxFuture<'static, DispatchResult<Response>> {
        Box::pin(async move {
            let scenes = ScenesManager::from_context(&event, &data)?;
            scenes.enter(&self.scene, Data::new()).await?;
            Ok(Response::empty())
        })
    }
}

// ============================================================================
// SceneBuilder
// ============================================================================

/// Declares the handlers and actions of a scene.
pub struct SceneBuilder {
    name: String,
    config: SceneConfig,
    handlers: Vec<(EventType, HandlerObject)>,
    actions: ActionMap,
}

impl SceneBuilder {
    /// Starts a scene whose state name is `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: SceneConfig::default(),
            handlers: Vec::new(),
            actions: HashMap::new(),
        }
    }

    pub fn config(mut self, config: SceneConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a handler for `event_type` events while the scene is active.
    pub fn handler<H, T>(mut self, event_type: EventType, handler: H, filters: impl IntoFilters) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers
            .push((event_type, HandlerObject::new(handler, filters.into_filters())));
        self
    }

    /// Like [`handler`](Self::handler), then performs `after` once the
    /// handler succeeded.
    pub fn handler_after<H, T>(
        mut self,
        event_type: EventType,
        handler: H,
        filters: impl IntoFilters,
        after: After,
    ) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        let inner = Arc::new(HandlerObject::new(handler, Vec::new()));
        let name = inner.name().to_string();
        let callback: HandlerCallback = Arc::new(
            move |event: TelegramEvent, data: Data| -> BoxFuture<'static, DispatchResult<Response>> {
                let inner = inner.clone();
                let after = after.clone();
                Box::pin(async move {
                    let wizard = data.get_cloned::<SceneWizard>(keys::WIZARD);
                    let response = inner.call(event, data).await?;
                    let wizard = wizard.ok_or(ExtractError::Missing { key: keys::WIZARD })?;
                    match after {
                        After::Exit => wizard.exit(Data::new()).await?,
                        After::Back => wizard.back(Data::new()).await?,
                        After::Goto(scene) => wizard.goto(&scene, Data::new()).await?,
                    }
                    Ok(response)
                })
            },
        );

        let mut params = ParamSpec::default();
        params.accept_all();
        let object = HandlerObject::from_callback(name, callback, params, filters.into_filters(), Flags::new());
        self.handlers.push((event_type, object));
        self
    }

    fn action<H, T>(mut self, action: SceneAction, event_type: EventType, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.actions
            .entry(action)
            .or_default()
            .insert(event_type, Arc::new(HandlerObject::new(handler, Vec::new())));
        self
    }

    /// Runs when the scene is entered by an `event_type` event.
    pub fn on_enter<H: Handler<T>, T: 'static>(self, event_type: EventType, handler: H) -> Self {
        self.action(SceneAction::Enter, event_type, handler)
    }

    /// Runs when the scene is left for another one or for no scene.
    pub fn on_leave<H: Handler<T>, T: 'static>(self, event_type: EventType, handler: H) -> Self {
        self.action(SceneAction::Leave, event_type, handler)
    }

    /// Runs when the scenes are exited altogether.
    pub fn on_exit<H: Handler<T>, T: 'static>(self, event_type: EventType, handler: H) -> Self {
        self.action(SceneAction::Exit, event_type, handler)
    }

    /// Runs when going back from this scene. Falls back to the leave action.
    pub fn on_back<H: Handler<T>, T: 'static>(self, event_type: EventType, handler: H) -> Self {
        self.action(SceneAction::Back, event_type, handler)
    }

    /// Compiles the scene into its router.
    pub fn build(self) -> Arc<Scene> {
        let Self {
            name,
            config,
            handlers,
            actions,
        } = self;

        Arc::new_cyclic(|weak: &Weak<Scene>| {
            let router = Router::new(format!("scene:{name}"));
            for kind in EventType::ALL {
                if matches!(kind, EventType::Update | EventType::Error) {
                    continue;
                }
                let observer = router.observer(kind);
                observer
                    .outer_middleware()
                    .register(WizardMiddleware { scene: weak.clone() });
                if kind == EventType::CallbackQuery && config.callback_query_without_state {
                    continue;
                }
                observer.filter(StateFilter::exact(name.clone()));
            }
            for (kind, handler) in handlers {
                router.observer(kind).register_object(handler);
            }

            Scene {
                name,
                router,
                actions,
                config,
            }
        })
    }
}

/// Injects the wizard of the scene into its handlers.
struct WizardMiddleware {
    scene: Weak<Scene>,
}

#[async_trait]
impl Middleware for WizardMiddleware {
    async fn call(&self, next: Next, event: TelegramEvent, mut data: Data) -> DispatchResult<Outcome> {
        if let (Some(scene), Some(manager)) = (
            self.scene.upgrade(),
            data.get_cloned::<ScenesManager>(keys::SCENES),
        ) {
            data.insert(keys::WIZARD, SceneWizard::new(manager, scene));
        }
        next(event, data).await
    }
}

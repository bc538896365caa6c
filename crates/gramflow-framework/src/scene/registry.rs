use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::builder::Scene;
use super::manager::ScenesManager;
use crate::context::{Data, keys};
use crate::error::{DispatchResult, SceneError};
use crate::event::{EventType, TelegramEvent};
use crate::fsm::FsmContext;
use crate::handler::Outcome;
use crate::middleware::{Middleware, Next};
use crate::router::{Router, WeakRouter};

struct RegistryInner {
    router_name: String,
    // The router owns the middleware that owns this registry.
    router: WeakRouter,
    scenes: RwLock<HashMap<String, Arc<Scene>>>,
}

/// Scenes reachable from one router.
///
/// Creating a registry installs an outer middleware on every event
/// observer of `router` that injects a [`ScenesManager`] as `scenes`
/// whenever an FSM context is available. The middleware keeps the scenes
/// alive, so the handle may be dropped once setup is done. Cheap to clone.
#[derive(Clone)]
pub struct SceneRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for SceneRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.inner.scenes.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("SceneRegistry")
            .field("router", &self.inner.router_name)
            .field("scenes", &names)
            .finish()
    }
}

impl SceneRegistry {
    pub fn new(router: &Router) -> Self {
        let inner = Arc::new(RegistryInner {
            router_name: router.name().to_string(),
            router: router.downgrade(),
            scenes: RwLock::new(HashMap::new()),
        });
        for kind in EventType::ALL {
            if matches!(kind, EventType::Update | EventType::Error) {
                continue;
            }
            router
                .observer(kind)
                .outer_middleware()
                .register(ScenesMiddleware {
                    registry: inner.clone(),
                });
        }
        Self { inner }
    }

    /// Registers `scene` and includes its router.
    pub fn add(&self, scene: Arc<Scene>) -> Result<(), SceneError> {
        let router = self.router()?;
        let mut scenes = self.inner.scenes.write();
        if scenes.contains_key(scene.name()) {
            return Err(SceneError::Duplicate(scene.name().to_string()));
        }
        router.include_router(scene.router())?;
        debug!(scene = scene.name(), "Registered scene");
        scenes.insert(scene.name().to_string(), scene);
        Ok(())
    }

    /// Registers several scenes in order, stopping at the first failure.
    pub fn add_all(&self, scenes: impl IntoIterator<Item = Arc<Scene>>) -> Result<(), SceneError> {
        for scene in scenes {
            self.add(scene)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Scene>, SceneError> {
        self.inner
            .scenes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SceneError::NotFound(name.to_string()))
    }

    /// The router scenes are attached to, unless it was dropped.
    pub fn router(&self) -> Result<Router, SceneError> {
        self.inner
            .router
            .upgrade()
            .ok_or_else(|| SceneError::RouterDropped(self.inner.router_name.clone()))
    }
}

struct ScenesMiddleware {
    registry: Arc<RegistryInner>,
}

#[async_trait]
impl Middleware for ScenesMiddleware {
    async fn call(&self, next: Next, event: TelegramEvent, mut data: Data) -> DispatchResult<Outcome> {
        if !data.contains(keys::SCENES)
            && let Some(state) = data.get_cloned::<FsmContext>(keys::STATE)
        {
            let manager = ScenesManager::new(
                SceneRegistry {
                    inner: self.registry.clone(),
                },
                event.event_type(),
                event.clone(),
                state,
                data.clone(),
            );
            data.insert(keys::SCENES, manager);
        }
        next(event, data).await
    }
}

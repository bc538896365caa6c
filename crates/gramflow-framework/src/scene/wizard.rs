use std::fmt;
use std::sync::Arc;

use super::builder::Scene;
use super::manager::ScenesManager;
use crate::context::Data;
use crate::error::{DispatchResult, StorageResult};
use crate::fsm::{FsmContext, StorageData};

/// Transitions and data of the active scene, injected as `wizard` into its
/// handlers and actions.
#[derive(Clone)]
pub struct SceneWizard {
    manager: ScenesManager,
    scene: Arc<Scene>,
}

impl fmt::Debug for SceneWizard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneWizard")
            .field("scene", &self.scene.name())
            .finish_non_exhaustive()
    }
}

impl SceneWizard {
    pub fn new(manager: ScenesManager, scene: Arc<Scene>) -> Self {
        Self { manager, scene }
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn manager(&self) -> &ScenesManager {
        &self.manager
    }

    pub fn state(&self) -> &FsmContext {
        self.manager.state()
    }

    /// Enters another scene, recording this one in the history.
    pub async fn goto(&self, scene: &str, kwargs: Data) -> DispatchResult<()> {
        self.manager.enter(scene, kwargs).await
    }

    pub async fn leave(&self, kwargs: Data) -> DispatchResult<()> {
        self.manager.leave(kwargs).await
    }

    pub async fn exit(&self, kwargs: Data) -> DispatchResult<()> {
        self.manager.exit(kwargs).await
    }

    pub async fn back(&self, kwargs: Data) -> DispatchResult<()> {
        self.manager.back(kwargs).await
    }

    /// Leaves and re-enters this scene.
    pub async fn retake(&self, kwargs: Data) -> DispatchResult<()> {
        self.manager.retake(kwargs).await
    }

    pub async fn get_data(&self) -> StorageResult<StorageData> {
        self.state().get_data().await
    }

    pub async fn set_data(&self, data: StorageData) -> StorageResult<()> {
        self.state().set_data(data).await
    }

    pub async fn update_data(&self, patch: StorageData) -> StorageResult<StorageData> {
        self.state().update_data(patch).await
    }

    pub async fn clear_data(&self) -> StorageResult<()> {
        self.state().set_data(StorageData::new()).await
    }
}

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::builder::{Scene, SceneAction};
use super::history::HistoryManager;
use super::registry::SceneRegistry;
use super::wizard::SceneWizard;
use crate::context::{Data, keys};
use crate::error::{DispatchResult, StorageResult};
use crate::event::{EventType, TelegramEvent};
use crate::fsm::{FsmContext, StorageData};

/// Scene transitions of one conversation, injected as `scenes`.
///
/// Action handlers run with the data the manager was created with, merged
/// with the `kwargs` of the transition, plus `scenes`, `wizard` and the
/// FSM entries.
#[derive(Clone)]
pub struct ScenesManager {
    registry: SceneRegistry,
    event_type: EventType,
    event: TelegramEvent,
    state: FsmContext,
    history: HistoryManager,
    data: Data,
}

impl fmt::Debug for ScenesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenesManager")
            .field("event_type", &self.event_type)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ScenesManager {
    pub fn new(
        registry: SceneRegistry,
        event_type: EventType,
        event: TelegramEvent,
        state: FsmContext,
        data: Data,
    ) -> Self {
        let history = HistoryManager::new(&state);
        Self {
            registry,
            event_type,
            event,
            state,
            history,
            data,
        }
    }

    pub fn state(&self) -> &FsmContext {
        &self.state
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// The scene of the current state, if it is a registered scene.
    pub async fn active_scene(&self) -> DispatchResult<Option<Arc<Scene>>> {
        let state = self.state.get_state().await?;
        Ok(state.and_then(|name| self.registry.get(&name).ok()))
    }

    /// Enters `scene`, leaving the active one first.
    ///
    /// On failure of the enter action the previous state and data are
    /// restored. The previous scene is recorded in the history only once
    /// the enter action succeeded.
    pub async fn enter(&self, scene: &str, kwargs: Data) -> DispatchResult<()> {
        self.enter_scene(scene, kwargs, true).await
    }

    /// Re-enters the active scene without recording history.
    pub async fn retake(&self, kwargs: Data) -> DispatchResult<()> {
        match self.active_scene().await? {
            Some(scene) => self.enter_scene(scene.name(), kwargs, false).await,
            None => Ok(()),
        }
    }

    async fn enter_scene(&self, name: &str, kwargs: Data, record_history: bool) -> DispatchResult<()> {
        let target = self.registry.get(name)?;
        let previous_state = self.state.get_state().await?;
        let previous_data = self.state.get_data().await?;

        if let Some(active) = self.lookup(previous_state.as_deref()) {
            self.run_action(&active, SceneAction::Leave, &kwargs).await?;
        }

        debug!(scene = target.name(), from = ?previous_state, "Entering scene");
        if target.config().reset_data_on_enter {
            self.state.set_data(StorageData::new()).await?;
        }
        self.state
            .set_raw_state(Some(target.name().to_string()))
            .await?;
        if let Err(err) = self.run_action(&target, SceneAction::Enter, &kwargs).await {
            rolled_back(self.state.set_raw_state(previous_state).await);
            rolled_back(self.state.set_data(previous_data).await);
            return Err(err);
        }

        if target.config().reset_history_on_enter {
            self.history.clear().await?;
        } else if record_history && previous_state.is_some() {
            self.history.push(previous_state, previous_data).await?;
        }
        Ok(())
    }

    /// Leaves the active scene, keeping the history.
    pub async fn leave(&self, kwargs: Data) -> DispatchResult<()> {
        self.close_scene(SceneAction::Leave, kwargs).await
    }

    /// Leaves the active scene and forgets the history.
    pub async fn exit(&self, kwargs: Data) -> DispatchResult<()> {
        self.close_scene(SceneAction::Exit, kwargs).await?;
        self.history.clear().await?;
        Ok(())
    }

    async fn close_scene(&self, action: SceneAction, kwargs: Data) -> DispatchResult<()> {
        let previous_state = self.state.get_state().await?;
        if let Some(active) = self.lookup(previous_state.as_deref()) {
            debug!(scene = active.name(), ?action, "Closing scene");
            if let Err(err) = self.run_action(&active, action, &kwargs).await {
                rolled_back(self.state.set_raw_state(previous_state).await);
                return Err(err);
            }
        }
        self.state.clear_state().await?;
        Ok(())
    }

    /// Returns to the previous scene, or exits when there is none.
    pub async fn back(&self, kwargs: Data) -> DispatchResult<()> {
        let Some(entry) = self.history.pop().await? else {
            return self.exit(kwargs).await;
        };
        let previous_state = self.state.get_state().await?;
        let previous_data = self.state.get_data().await?;

        if let Some(active) = self.lookup(previous_state.as_deref()) {
            let action = if active.action(SceneAction::Back, self.event_type).is_some() {
                SceneAction::Back
            } else {
                SceneAction::Leave
            };
            if let Err(err) = self.run_action(&active, action, &kwargs).await {
                rolled_back(self.history.push_entry(entry).await);
                return Err(err);
            }
        }

        let target = self.lookup(entry.state.as_deref());
        debug!(to = ?entry.state, "Going back");
        self.state.set_raw_state(entry.state.clone()).await?;
        self.state.set_data(entry.data.clone()).await?;
        let Some(target) = target else {
            return Ok(());
        };
        if let Err(err) = self.run_action(&target, SceneAction::Enter, &kwargs).await {
            rolled_back(self.state.set_raw_state(previous_state).await);
            rolled_back(self.state.set_data(previous_data).await);
            rolled_back(self.history.push_entry(entry).await);
            return Err(err);
        }
        Ok(())
    }

    fn lookup(&self, state: Option<&str>) -> Option<Arc<Scene>> {
        self.registry.get(state?).ok()
    }

    async fn run_action(&self, scene: &Arc<Scene>, action: SceneAction, kwargs: &Data) -> DispatchResult<()> {
        let Some(handler) = scene.action(action, self.event_type) else {
            return Ok(());
        };
        let mut data = self.data.merged(kwargs);
        data.insert(keys::SCENES, self.clone());
        data.insert(keys::WIZARD, SceneWizard::new(self.clone(), scene.clone()));
        data.insert(keys::STATE, self.state.clone());
        data.insert(keys::RAW_STATE, self.state.get_state().await?);
        data.insert(keys::HANDLER, handler.clone());
        handler.call(self.event.clone(), data).await?;
        Ok(())
    }
}

/// Logs a failed rollback write. The error that caused the rollback is the
/// one returned to the caller.
fn rolled_back(result: StorageResult<()>) {
    if let Err(err) = result {
        warn!(error = %err, "Failed to roll back scene transition");
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use gramflow_core::Update;
use tracing::{debug, trace};

use super::{Middleware, Next};
use crate::context::{Data, keys};
use crate::error::DispatchResult;
use crate::event::{ErrorEvent, EventType, TelegramEvent};
use crate::handler::Outcome;
use crate::router::{Router, WeakRouter};

/// Routes handler errors to `error` observers.
///
/// Installed by the dispatcher as outer middleware of the root `update`
/// observer. Any error other than skip or cancel is wrapped into an
/// [`ErrorEvent`] and propagated through the router tree. A handled error
/// event replaces the failure; otherwise the original error is returned.
pub struct ErrorsMiddleware {
    router: WeakRouter,
}

impl ErrorsMiddleware {
    pub fn new(router: &Router) -> Self {
        Self {
            router: router.downgrade(),
        }
    }
}

#[async_trait]
impl Middleware for ErrorsMiddleware {
    async fn call(&self, next: Next, event: TelegramEvent, data: Data) -> DispatchResult<Outcome> {
        let fallback_update = match &event {
            TelegramEvent::Update(update) => Some(update.clone()),
            _ => None,
        };

        let exception = match next(event, data.clone()).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if err.is_control_flow() => return Err(err),
            Err(err) => err,
        };

        let Some(router) = self.router.upgrade() else {
            return Err(exception);
        };

        let update = data
            .get_cloned::<Arc<Update>>(keys::EVENT_UPDATE)
            .or(fallback_update)
            .unwrap_or_default();
        debug!(error = %exception, "Dispatching error event");

        let error_event = TelegramEvent::Error(Arc::new(ErrorEvent {
            update,
            exception: exception.clone(),
        }));
        match router
            .propagate_event(EventType::Error, error_event, data)
            .await?
        {
            Outcome::Handled(response) => Ok(Outcome::Handled(response)),
            _ => {
                trace!(error = %exception, "Error event was not handled");
                Err(exception)
            }
        }
    }
}

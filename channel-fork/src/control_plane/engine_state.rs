//! Validated engine state machine mirrored into the `module-state` attribute.

use crate::api::attributes::{AttributeValue, Attributes, MODULE_STATE};
use crate::api::module_state::EngineState;
use crate::observability::events;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

const COMPONENT: &str = "engine_state";

fn is_allowed(from: EngineState, to: EngineState) -> bool {
    use EngineState::*;
    matches!(
        (from, to),
        (Starting, Running)
            | (Starting, Error)
            | (Starting, Stopped)
            | (Running, Stopped)
            | (Running, Error)
    )
}

struct StateInner {
    current: EngineState,
    attributes: Option<Arc<dyn Attributes>>,
}

/// Current engine state plus the attribute store it is reported to.
///
/// Transitions and their reports happen under one lock, so the attribute store
/// sees states in the order they were entered.
pub(crate) struct ModuleState {
    module_id: String,
    inner: Mutex<StateInner>,
}

impl ModuleState {
    pub(crate) fn new(module_id: &str) -> Self {
        Self {
            module_id: module_id.to_string(),
            inner: Mutex::new(StateInner {
                current: EngineState::Starting,
                attributes: None,
            }),
        }
    }

    pub(crate) async fn current(&self) -> EngineState {
        self.inner.lock().await.current
    }

    /// Starts reporting to `attributes`: registers `module-state` if needed and
    /// publishes the current state.
    pub(crate) async fn bind(&self, attributes: Arc<dyn Attributes>) {
        let mut inner = self.inner.lock().await;
        if !attributes.has(MODULE_STATE).await {
            if let Err(err) = attributes.add(MODULE_STATE).await {
                warn!(
                    event = events::MODULE_STATE_REPORT_FAILED,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    err = %err,
                    "unable to register module state attribute"
                );
            }
        }
        inner.attributes = Some(attributes);
        self.report(&inner).await;
    }

    /// Moves to `next` if the transition is allowed. Returns whether it was applied.
    pub(crate) async fn transition_to(&self, next: EngineState) -> bool {
        let mut inner = self.inner.lock().await;
        let previous = inner.current;
        if !is_allowed(previous, next) {
            warn!(
                event = events::MODULE_STATE_REJECTED,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                state = %previous,
                requested = %next,
                "rejected module state transition"
            );
            return false;
        }

        inner.current = next;
        info!(
            event = events::MODULE_STATE_CHANGE,
            component = COMPONENT,
            module_id = self.module_id.as_str(),
            previous = %previous,
            state = %next,
            "module state changed"
        );
        self.report(&inner).await;
        true
    }

    async fn report(&self, inner: &StateInner) {
        let Some(attributes) = inner.attributes.as_ref() else {
            return;
        };
        if let Err(err) = attributes
            .set(MODULE_STATE, AttributeValue::State(inner.current))
            .await
        {
            warn!(
                event = events::MODULE_STATE_REPORT_FAILED,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                state = %inner.current,
                err = %err,
                "unable to report module state"
            );
        }
    }
}

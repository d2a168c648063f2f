//! Timeout-bounded waits on the registry and bindings.
//!
//! Waiters park on the manager's change signal (or a binding's start latch)
//! instead of polling, and re-read the shared timeout every time they wake.
//! The three timeout policies differ on purpose:
//!
//! - `wait_for_class`: hard. Fails with [`WaitError::ClassTimeout`].
//! - `await_component`: soft. Emits a diagnostic and returns `None`.
//! - `await_start`: soft, unbounded. Emits a diagnostic per elapsed window
//!   and keeps waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use tether_types::EntityId;

use crate::error::{StartError, WaitError};
use crate::events::LifecycleEvent;
use crate::registry::ClassEntry;
use crate::{Binding, ComponentManager, StartState};

/// Floor for one `await_start` diagnostic window, so a zero timeout cannot
/// turn the wait into a spin.
const MIN_START_WINDOW: Duration = Duration::from_millis(1);

/// Time left before `timeout` has elapsed since `started`, if any.
fn remaining(started: Instant, timeout: Duration) -> Option<Duration> {
    timeout
        .checked_sub(started.elapsed())
        .filter(|left| !left.is_zero())
}

impl ComponentManager {
    /// Wait until `name` is registered.
    ///
    /// Fails once the shared timeout has elapsed with the class still
    /// missing; a missing class almost always means a misspelled dependency.
    pub async fn wait_for_class(&self, name: &str) -> Result<(), WaitError> {
        self.class_entry(name).await.map(|_| ())
    }

    pub(crate) async fn class_entry(&self, name: &str) -> Result<Arc<ClassEntry>, WaitError> {
        let started = Instant::now();
        let mut changes = self.inner.changes.subscribe();
        loop {
            if let Some(entry) = self.inner.registry.get(name) {
                return Ok(entry);
            }
            let timeout = self.inner.knobs.timeout();
            let Some(left) = remaining(started, timeout) else {
                return Err(WaitError::ClassTimeout {
                    name: name.to_string(),
                    timeout,
                });
            };
            // Elapsed or woken, the loop re-checks either way. The sender
            // lives as long as `self`, so `changed` cannot fail.
            let _ = tokio::time::timeout(left, changes.changed()).await;
        }
    }

    /// The binding of `entity` under `name`, or `None` if it has none.
    ///
    /// Waits for the class to be registered first; an absent binding is not
    /// an error.
    pub async fn get_component(
        &self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<Binding>, WaitError> {
        let entry = self.class_entry(name).await?;
        Ok(entry.table.get(entity))
    }

    /// Wait for `entity` to be bound under `name`.
    ///
    /// Returns the binding as soon as it exists. After the shared timeout
    /// a diagnostic is emitted and `Ok(None)` comes back; callers must be
    /// ready for that. Only a class that never registers is an error.
    pub async fn await_component(
        &self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<Binding>, WaitError> {
        let started = Instant::now();
        let mut changes = self.inner.changes.subscribe();
        let entry = self.class_entry(name).await?;
        loop {
            if let Some(binding) = entry.table.get(entity) {
                return Ok(Some(binding));
            }
            let timeout = self.inner.knobs.timeout();
            let Some(left) = remaining(started, timeout) else {
                if self.inner.knobs.warn_enabled() {
                    tracing::warn!(
                        component = %entry.name,
                        entity = %entity,
                        "Timed out after {timeout:?} waiting for component"
                    );
                }
                self.emit(LifecycleEvent::AwaitTimedOut {
                    component: name.to_string(),
                    entity,
                });
                return Ok(None);
            };
            let _ = tokio::time::timeout(left, changes.changed()).await;
        }
    }

    /// Alias of [`Self::await_component`].
    pub async fn wait_for_component(
        &self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<Binding>, WaitError> {
        self.await_component(entity, name).await
    }

    /// Wait until `binding` has finished starting.
    ///
    /// Returns immediately if it already has. Each time a full timeout
    /// window passes a diagnostic is emitted and the wait continues; there
    /// is no give-up. A start that failed, or a binding destroyed before
    /// its start finished, ends the wait with a [`StartError`].
    pub async fn await_start(&self, binding: &Binding) -> Result<Binding, StartError> {
        let started = Instant::now();
        let mut window_start = started;
        let mut state = binding.subscribe_state();
        loop {
            let current = state.borrow_and_update().clone();
            if let Some(err) = binding.start_error(&current) {
                return Err(err);
            }
            if matches!(current, StartState::Started) {
                return Ok(binding.clone());
            }

            let window = self.inner.knobs.timeout().max(MIN_START_WINDOW);
            match tokio::time::timeout_at(window_start + window, state.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    return Err(StartError::Cancelled {
                        name: binding.name().clone(),
                        entity: binding.entity(),
                    });
                }
                Err(_) => {
                    let waited = started.elapsed();
                    if self.inner.knobs.warn_enabled() {
                        tracing::warn!(
                            component = %binding.name(),
                            entity = %binding.entity(),
                            "Still waiting for component to start after {waited:?}"
                        );
                    }
                    self.emit(LifecycleEvent::StartWaitElapsed {
                        component: binding.name().clone(),
                        entity: binding.entity(),
                        waited,
                    });
                    window_start = Instant::now();
                }
            }
        }
    }
}

//! Live component instances and their startup latch.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tether_types::{ComponentName, EntityId, Tag};

use crate::Component;
use crate::error::StartError;

/// Startup progress of one binding.
///
/// Moves out of `Pending` exactly once and never moves back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartState {
    Pending,
    Started,
    Failed(String),
    /// Destroyed before `start` completed; the start task was aborted.
    Cancelled,
}

impl StartState {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Handle to one live component instance.
///
/// Cloning is cheap; all clones refer to the same instance. The manager's
/// binding table is the only place that decides whether the instance is
/// still live.
#[derive(Clone)]
pub struct Binding {
    inner: Arc<BindingInner>,
}

struct BindingInner {
    entity: EntityId,
    name: ComponentName,
    tag: Tag,
    component: Arc<dyn Component>,
    state: watch::Sender<StartState>,
    start_task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl Binding {
    pub(crate) fn new(
        entity: EntityId,
        name: ComponentName,
        tag: Tag,
        component: Arc<dyn Component>,
    ) -> Self {
        let (state, _) = watch::channel(StartState::Pending);
        Self {
            inner: Arc::new(BindingInner {
                entity,
                name,
                tag,
                component,
                state,
                start_task: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.inner.entity
    }

    #[must_use]
    pub fn name(&self) -> &ComponentName {
        &self.inner.name
    }

    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.inner.tag
    }

    #[must_use]
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.inner.component
    }

    /// The component as its concrete type, if it is a `T`.
    #[must_use]
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        let any: Arc<dyn Any + Send + Sync> = self.inner.component.clone();
        any.downcast::<T>().ok()
    }

    /// True once `start` has completed successfully. Never reverts.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(*self.inner.state.borrow(), StartState::Started)
    }

    #[must_use]
    pub fn start_state(&self) -> StartState {
        self.inner.state.borrow().clone()
    }

    /// Whether two handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<StartState> {
        self.inner.state.subscribe()
    }

    /// Keep the start task so a destroy can abort it. A destroy that landed
    /// between spawn and attach already latched `Cancelled`; abort here.
    pub(crate) fn attach_start_task(&self, handle: JoinHandle<()>) {
        let mut slot = self
            .inner
            .start_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(*self.inner.state.borrow(), StartState::Cancelled) {
            handle.abort();
            return;
        }
        *slot = Some(handle);
    }

    /// Record the outcome of `start`. Ignored if the binding already left
    /// `Pending` (e.g. it was cancelled by a concurrent destroy).
    pub(crate) fn finish_start(&self, outcome: anyhow::Result<()>) -> Option<StartState> {
        let next = match outcome {
            Ok(()) => StartState::Started,
            Err(e) => StartState::Failed(format!("{e:#}")),
        };
        let applied = self.inner.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = next.clone();
                true
            } else {
                false
            }
        });
        applied.then_some(next)
    }

    /// Abort an in-flight `start` and latch `Cancelled`.
    ///
    /// Returns true if the binding was still pending.
    pub(crate) fn cancel_start(&self) -> bool {
        let cancelled = self.inner.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = StartState::Cancelled;
                true
            } else {
                false
            }
        });
        let task = self
            .inner
            .start_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if cancelled && let Some(task) = task {
            task.abort();
        }
        cancelled
    }

    /// Claim the one-time teardown. Returns false if already claimed.
    pub(crate) fn mark_destroyed(&self) -> bool {
        !self.inner.destroyed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn start_error(&self, state: &StartState) -> Option<StartError> {
        match state {
            StartState::Pending | StartState::Started => None,
            StartState::Failed(message) => Some(StartError::Failed {
                name: self.inner.name.clone(),
                entity: self.inner.entity,
                message: message.clone(),
            }),
            StartState::Cancelled => Some(StartError::Cancelled {
                name: self.inner.name.clone(),
                entity: self.inner.entity,
            }),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("entity", &self.inner.entity)
            .field("name", &self.inner.name)
            .field("tag", &self.inner.tag)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

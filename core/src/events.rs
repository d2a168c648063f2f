//! Lifecycle notifications published by the manager.

use std::time::Duration;

use tether_types::{ComponentName, EntityId};

/// Buffered events per subscriber before the slowest one starts lagging.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// An observable step in a binding's life.
///
/// Published regardless of the debug toggles; the toggles only affect logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A binding was inserted into its class's table.
    Bound {
        component: ComponentName,
        entity: EntityId,
    },
    /// A binding was torn down and removed.
    Unbound {
        component: ComponentName,
        entity: EntityId,
    },
    Started {
        component: ComponentName,
        entity: EntityId,
    },
    /// `start` returned an error. The binding stays in the table.
    StartFailed {
        component: ComponentName,
        entity: EntityId,
        error: String,
    },
    /// The binding was destroyed while `start` was still running.
    StartCancelled {
        component: ComponentName,
        entity: EntityId,
    },
    /// A tagged entity appeared outside the class's ancestor scope.
    OutOfScope {
        component: ComponentName,
        entity: EntityId,
    },
    /// `await_component` gave up and returned nothing.
    AwaitTimedOut {
        component: String,
        entity: EntityId,
    },
    /// `await_start` has been waiting for another full timeout window.
    StartWaitElapsed {
        component: ComponentName,
        entity: EntityId,
        waited: Duration,
    },
}

impl LifecycleEvent {
    #[must_use]
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Bound { entity, .. }
            | Self::Unbound { entity, .. }
            | Self::Started { entity, .. }
            | Self::StartFailed { entity, .. }
            | Self::StartCancelled { entity, .. }
            | Self::OutOfScope { entity, .. }
            | Self::AwaitTimedOut { entity, .. }
            | Self::StartWaitElapsed { entity, .. } => *entity,
        }
    }
}

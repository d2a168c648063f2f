//! Error taxonomy for the manager.
//!
//! Configuration problems and hard timeouts are errors. Soft timeouts
//! (`await_component`, `await_start`) are diagnostics and never show up here.

use std::time::Duration;

use thiserror::Error;

use tether_types::{ComponentName, EntityId, InvalidName, InvalidTag};

/// Registration failures. Fatal for the class being registered.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
    #[error("component '{name}': {source}")]
    InvalidTag {
        name: ComponentName,
        #[source]
        source: InvalidTag,
    },
    #[error("component '{name}' has no constructor")]
    MissingConstructor { name: ComponentName },
    #[error("component '{name}' is already registered")]
    DuplicateName { name: ComponentName },
    #[error("component '{name}' failed to bind a tagged entity during registration")]
    Bootstrap {
        name: ComponentName,
        #[source]
        source: LifecycleError,
    },
}

/// Failures of `create` for one (class, entity) pair.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("component '{name}' is not registered")]
    UnknownClass { name: String },
    #[error("component '{name}' failed to construct for entity {entity}")]
    Construct {
        name: ComponentName,
        entity: EntityId,
        #[source]
        source: anyhow::Error,
    },
}

/// Hard timeout: the class never showed up.
#[derive(Debug, Clone, Error)]
pub enum WaitError {
    #[error("component '{name}' was not registered within {timeout:?}")]
    ClassTimeout { name: String, timeout: Duration },
}

/// Terminal non-success outcomes of a binding's startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("component '{name}' failed to start on entity {entity}: {message}")]
    Failed {
        name: ComponentName,
        entity: EntityId,
        message: String,
    },
    #[error("component '{name}' on entity {entity} was destroyed before it finished starting")]
    Cancelled { name: ComponentName, entity: EntityId },
}

//! Component behavior and class descriptors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use tether_types::EntityId;

use crate::Binding;

/// Behavior bound to one entity.
///
/// `start` runs on its own task after the binding is inserted and may
/// suspend freely. `destroy` is synchronous teardown and runs exactly once
/// per live binding.
#[async_trait]
pub trait Component: Any + Send + Sync {
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn destroy(&self);
}

/// Builds the component instance for one entity. Must not suspend.
pub type Constructor = Arc<dyn Fn(EntityId) -> anyhow::Result<Arc<dyn Component>> + Send + Sync>;

/// Hook invoked on every new binding before its startup is scheduled.
pub type InjectFn = Arc<dyn Fn(&Binding) + Send + Sync>;

/// Descriptor for one component class.
///
/// Fields are validated by `ComponentManager::register`, not here, so a
/// descriptor can be assembled piecemeal (e.g. from configuration) and
/// rejected as a whole.
#[derive(Clone)]
pub struct ComponentClass {
    pub(crate) name: String,
    pub(crate) tag: String,
    pub(crate) ancestor: Option<EntityId>,
    pub(crate) constructor: Option<Constructor>,
}

impl ComponentClass {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            ancestor: None,
            constructor: None,
        }
    }

    /// Restrict bindings to descendants of `ancestor` (inclusive).
    /// Defaults to the scene root.
    pub fn with_ancestor(mut self, ancestor: EntityId) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    pub fn with_constructor<F>(mut self, construct: F) -> Self
    where
        F: Fn(EntityId) -> anyhow::Result<Arc<dyn Component>> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(construct));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn ancestor(&self) -> Option<EntityId> {
        self.ancestor
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("ancestor", &self.ancestor)
            .field("constructor", &self.constructor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

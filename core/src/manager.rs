//! `ComponentManager` facade: registration and the create/destroy lifecycle.
//!
//! The manager is a cheap-clone handle over shared state. Registration
//! bootstraps every tagged, in-scope entity synchronously, yields once, and
//! then hands the class's tag stream to a bridge task that keeps bindings
//! in sync. Wait primitives live in `wait.rs`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use tether_config::ManagerConfig;
use tether_types::{ComponentName, EntityId, Tag};

use crate::bridge;
use crate::error::{LifecycleError, RegisterError, WaitError};
use crate::events::{EVENT_CHANNEL_CAPACITY, LifecycleEvent};
use crate::knobs::Knobs;
use crate::registry::{BindingTable, ClassEntry, ClassRegistry};
use crate::{Binding, ComponentClass, SceneGraph, StartState};

/// Owns the class registry, every binding table, and the runtime knobs.
///
/// Independent managers share nothing.
#[derive(Clone)]
pub struct ComponentManager {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub scene: Arc<dyn SceneGraph>,
    pub registry: ClassRegistry,
    pub knobs: Knobs,
    /// Bumped on every registry or binding-table mutation; waiters park on it.
    pub changes: watch::Sender<u64>,
    pub events: broadcast::Sender<LifecycleEvent>,
    bridges: Mutex<Vec<JoinHandle<()>>>,
}

impl ComponentManager {
    /// Manager with default settings.
    pub fn new(scene: Arc<dyn SceneGraph>) -> Self {
        Self::with_config(scene, &ManagerConfig::default())
    }

    pub fn with_config(scene: Arc<dyn SceneGraph>, config: &ManagerConfig) -> Self {
        let (changes, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                scene,
                registry: ClassRegistry::default(),
                knobs: Knobs::from_config(config),
                changes,
                events,
                bridges: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    // ── Registration ─────────────────────────────────────────────

    /// Register a component class and bind every entity that already
    /// carries its tag within its ancestor scope.
    ///
    /// Must run inside a Tokio runtime: startup and the tag bridge are
    /// spawned tasks.
    pub async fn register(&self, class: ComponentClass) -> Result<(), RegisterError> {
        let name = ComponentName::new(class.name)?;
        let tag = Tag::new(class.tag).map_err(|source| RegisterError::InvalidTag {
            name: name.clone(),
            source,
        })?;
        let Some(constructor) = class.constructor else {
            return Err(RegisterError::MissingConstructor { name });
        };
        let scope = class.ancestor.unwrap_or_else(|| self.inner.scene.root());

        let entry = Arc::new(ClassEntry {
            name: name.clone(),
            tag: tag.clone(),
            scope,
            constructor,
            table: BindingTable::default(),
        });
        if !self.inner.registry.insert(Arc::clone(&entry)) {
            return Err(RegisterError::DuplicateName { name });
        }
        self.notify_change();
        tracing::debug!(component = %name, tag = %tag, scope = %scope, "Component registered");

        // Subscribe before the snapshot so nothing between the two is lost;
        // replays of snapshotted entities hit the idempotent create.
        let stream = self.inner.scene.subscribe(&tag);

        for entity in self.inner.scene.tagged(&tag) {
            if !self.inner.scene.is_ancestor_of(scope, entity) {
                continue;
            }
            self.create_in(&entry, entity)
                .map_err(|source| RegisterError::Bootstrap {
                    name: name.clone(),
                    source,
                })?;
        }

        // Let bootstrap startups and other tasks run before events flow.
        tokio::task::yield_now().await;

        let handle = tokio::spawn(bridge::run(
            Arc::downgrade(&self.inner),
            Arc::clone(&entry),
            stream,
        ));
        self.inner
            .bridges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Bind `entity` to the named class.
    ///
    /// Returns `Ok(None)` if the entity is already bound; the constructor is
    /// not called in that case. Startup is scheduled, not awaited.
    pub fn create(
        &self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<Binding>, LifecycleError> {
        let entry = self
            .inner
            .registry
            .get(name)
            .ok_or_else(|| LifecycleError::UnknownClass {
                name: name.to_string(),
            })?;
        self.create_in(&entry, entity)
    }

    pub(crate) fn create_in(
        &self,
        entry: &ClassEntry,
        entity: EntityId,
    ) -> Result<Option<Binding>, LifecycleError> {
        if entry.table.contains(entity) {
            if self.inner.knobs.print_enabled() {
                tracing::debug!(component = %entry.name, entity = %entity, "Already bound; create skipped");
            }
            return Ok(None);
        }

        let component =
            (entry.constructor)(entity).map_err(|source| LifecycleError::Construct {
                name: entry.name.clone(),
                entity,
                source,
            })?;
        let binding = Binding::new(entity, entry.name.clone(), entry.tag.clone(), component);

        if !entry.table.insert_if_absent(binding.clone()) {
            // Another create won between the check and the insert.
            binding.component().destroy();
            return Ok(None);
        }
        self.notify_change();
        if self.inner.knobs.print_enabled() {
            tracing::debug!(component = %entry.name, entity = %entity, "Component bound");
        }
        self.emit(LifecycleEvent::Bound {
            component: entry.name.clone(),
            entity,
        });

        self.inner.knobs.inject(&binding);
        self.schedule_start(&binding);
        Ok(Some(binding))
    }

    fn schedule_start(&self, binding: &Binding) {
        let task_binding = binding.clone();
        let manager = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let outcome = task_binding.component().start().await;
            let Some(state) = task_binding.finish_start(outcome) else {
                return;
            };
            if let Some(inner) = manager.upgrade() {
                ComponentManager::from_inner(inner).report_start(&task_binding, &state);
            }
        });
        binding.attach_start_task(handle);
    }

    fn report_start(&self, binding: &Binding, state: &StartState) {
        let component = binding.name().clone();
        let entity = binding.entity();
        match state {
            StartState::Started => {
                if self.inner.knobs.print_enabled() {
                    tracing::debug!(component = %component, entity = %entity, "Component started");
                }
                self.emit(LifecycleEvent::Started { component, entity });
            }
            StartState::Failed(error) => {
                tracing::error!(component = %component, entity = %entity, error = %error, "Component failed to start");
                self.emit(LifecycleEvent::StartFailed {
                    component,
                    entity,
                    error: error.clone(),
                });
            }
            StartState::Pending | StartState::Cancelled => {}
        }
    }

    /// Tear down the binding for `entity`, if any.
    ///
    /// Waits for the class to be registered (hard timeout). Returns whether
    /// a binding was destroyed; an unbound entity is a no-op.
    pub async fn destroy(&self, entity: EntityId, name: &str) -> Result<bool, WaitError> {
        let entry = self.class_entry(name).await?;
        Ok(self.destroy_in(&entry, entity))
    }

    pub(crate) fn destroy_in(&self, entry: &ClassEntry, entity: EntityId) -> bool {
        self.inner.unbind(entry, entity)
    }

    /// Handle an `Added` event from the tag stream.
    pub(crate) fn on_tag_added(&self, entry: &ClassEntry, entity: EntityId) {
        if !self.inner.scene.is_ancestor_of(entry.scope, entity) {
            if self.inner.knobs.warn_enabled() {
                tracing::warn!(
                    component = %entry.name,
                    entity = %entity,
                    scope = %entry.scope,
                    "Tagged entity is outside the component's ancestor scope; not binding"
                );
            }
            self.emit(LifecycleEvent::OutOfScope {
                component: entry.name.clone(),
                entity,
            });
            return;
        }
        if let Err(e) = self.create_in(entry, entity) {
            tracing::error!(
                component = %entry.name,
                entity = %entity,
                "Failed to bind tagged entity: {:#}",
                anyhow::Error::from(e)
            );
        }
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Whether `entity` is bound to the named class. Never waits: an
    /// unregistered class simply answers false.
    #[must_use]
    pub fn has_component(&self, entity: EntityId, name: &str) -> bool {
        self.inner
            .registry
            .get(name)
            .is_some_and(|entry| entry.table.contains(entity))
    }

    /// Live bindings of one class, ordered by entity. Empty if unregistered.
    #[must_use]
    pub fn bindings(&self, name: &str) -> Vec<Binding> {
        self.inner
            .registry
            .get(name)
            .map(|entry| entry.table.snapshot())
            .unwrap_or_default()
    }

    /// Registered class names, ordered case-insensitively.
    #[must_use]
    pub fn registered_classes(&self) -> Vec<ComponentName> {
        self.inner
            .registry
            .entries()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Subscribe to lifecycle events from this point on.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    // ── Knobs ────────────────────────────────────────────────────

    /// Shared timeout for every wait primitive. Waits parked on the
    /// registry are woken so they re-read it.
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.knobs.set_timeout(timeout);
        self.notify_change();
    }

    /// Seconds form of [`Self::set_timeout`]. Negative and non-finite
    /// values are ignored with a warning.
    pub fn set_timeout_secs(&self, seconds: f64) {
        match Duration::try_from_secs_f64(seconds) {
            Ok(timeout) => self.set_timeout(timeout),
            Err(e) => tracing::warn!("Ignoring invalid timeout {seconds}: {e}"),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.knobs.timeout()
    }

    /// Toggle informational and warning diagnostics. Logging only.
    pub fn set_debug(&self, print: bool, warn: bool) {
        self.inner.knobs.set_debug(print, warn);
    }

    /// Replace the hook run on every new binding before its startup is
    /// scheduled.
    pub fn set_inject_function<F>(&self, inject: F)
    where
        F: Fn(&Binding) + Send + Sync + 'static,
    {
        self.inner.knobs.set_inject(Some(Arc::new(inject)));
    }

    pub fn clear_inject_function(&self) {
        self.inner.knobs.set_inject(None);
    }

    // ── Shutdown ─────────────────────────────────────────────────

    /// Stop every tag bridge and destroy every live binding.
    ///
    /// Classes stay registered; with their bridges gone they no longer
    /// react to tag changes.
    pub fn shutdown(&self) {
        self.inner.abort_bridges();
        self.inner.destroy_all();
        tracing::debug!("Component manager shut down");
    }

    // ── Internals ────────────────────────────────────────────────

    pub(crate) fn notify_change(&self) {
        self.inner.notify_change();
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        self.inner.emit(event);
    }
}

impl Inner {
    fn unbind(&self, entry: &ClassEntry, entity: EntityId) -> bool {
        let Some(binding) = entry.table.get(entity) else {
            return false;
        };
        if !binding.mark_destroyed() {
            return false;
        }

        if binding.cancel_start() {
            if self.knobs.warn_enabled() {
                tracing::warn!(component = %entry.name, entity = %entity, "Destroyed before start completed");
            }
            self.emit(LifecycleEvent::StartCancelled {
                component: entry.name.clone(),
                entity,
            });
        }
        binding.component().destroy();
        entry.table.remove_exact(&binding);
        self.notify_change();
        if self.knobs.print_enabled() {
            tracing::debug!(component = %entry.name, entity = %entity, "Component unbound");
        }
        self.emit(LifecycleEvent::Unbound {
            component: entry.name.clone(),
            entity,
        });
        true
    }

    fn abort_bridges(&self) {
        let bridges = std::mem::take(
            &mut *self
                .bridges
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for bridge in bridges {
            bridge.abort();
        }
    }

    fn destroy_all(&self) {
        for entry in self.registry.entries() {
            for binding in entry.table.snapshot() {
                self.unbind(&entry, binding.entity());
            }
        }
    }

    fn notify_change(&self) {
        self.changes.send_modify(|generation| {
            *generation = generation.wrapping_add(1);
        });
    }

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Dropping the last handle tears down like `shutdown`. Bridges hold only a
/// weak handle and would otherwise stay parked on their tag streams.
impl Drop for Inner {
    fn drop(&mut self) {
        self.abort_bridges();
        self.destroy_all();
    }
}

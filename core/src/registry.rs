//! Class registry and per-class binding tables.
//!
//! Presence in a class's table is the only record of "entity E has
//! component C". Locks here are never held across an await or while
//! component code runs.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tether_types::{ComponentName, EntityId, Tag};

use crate::{Binding, Constructor};

/// One registered class: its validated descriptor plus its live bindings.
pub(crate) struct ClassEntry {
    pub name: ComponentName,
    pub tag: Tag,
    /// Effective ancestor: the class's own, or the scene root.
    pub scope: EntityId,
    pub constructor: Constructor,
    pub table: BindingTable,
}

#[derive(Default)]
pub(crate) struct BindingTable {
    bindings: Mutex<HashMap<EntityId, Binding>>,
}

impl BindingTable {
    fn guard(&self) -> MutexGuard<'_, HashMap<EntityId, Binding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, entity: EntityId) -> Option<Binding> {
        self.guard().get(&entity).cloned()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.guard().contains_key(&entity)
    }

    /// Insert unless the entity is already bound. Returns false on conflict.
    pub fn insert_if_absent(&self, binding: Binding) -> bool {
        match self.guard().entry(binding.entity()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(binding);
                true
            }
        }
    }

    /// Remove `binding` only if it is still the live entry for its entity.
    pub fn remove_exact(&self, binding: &Binding) -> bool {
        let mut guard = self.guard();
        match guard.get(&binding.entity()) {
            Some(current) if current.ptr_eq(binding) => {
                guard.remove(&binding.entity());
                true
            }
            _ => false,
        }
    }

    /// Snapshot of live bindings, ordered by entity id.
    pub fn snapshot(&self) -> Vec<Binding> {
        let mut bindings: Vec<Binding> = self.guard().values().cloned().collect();
        bindings.sort_by_key(Binding::entity);
        bindings
    }
}

#[derive(Default)]
pub(crate) struct ClassRegistry {
    classes: RwLock<HashMap<ComponentName, Arc<ClassEntry>>>,
}

impl ClassRegistry {
    /// Look up by any spelling of the name.
    pub fn get(&self, name: &str) -> Option<Arc<ClassEntry>> {
        let key = name.trim().to_lowercase();
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
    }

    /// Insert a new class. Returns false if the name is taken.
    pub fn insert(&self, entry: Arc<ClassEntry>) -> bool {
        let mut guard = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        match guard.entry(entry.name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// All classes, ordered by normalized name.
    pub fn entries(&self) -> Vec<Arc<ClassEntry>> {
        let mut entries: Vec<Arc<ClassEntry>> = self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

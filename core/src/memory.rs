//! In-memory scene graph.
//!
//! A small tree of entities with per-entity tag sets that implements
//! [`SceneGraph`]. Hosts without a scene of their own, the scenario runner,
//! and the test suite all drive the manager through it.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use tether_types::{EntityId, Tag, TagEvent};

use crate::{SceneGraph, TagEventStream};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    #[error("the root entity cannot be removed or moved")]
    RootImmutable,
    #[error("moving {entity} under {parent} would create a cycle")]
    Cycle { entity: EntityId, parent: EntityId },
}

struct Node {
    parent: Option<EntityId>,
    tags: BTreeSet<Tag>,
}

struct SceneState {
    next_id: u64,
    root: EntityId,
    nodes: HashMap<EntityId, Node>,
    subscribers: HashMap<Tag, Vec<mpsc::UnboundedSender<TagEvent>>>,
}

impl SceneState {
    fn node(&self, entity: EntityId) -> Result<&Node, SceneError> {
        self.nodes
            .get(&entity)
            .ok_or(SceneError::UnknownEntity(entity))
    }

    fn node_mut(&mut self, entity: EntityId) -> Result<&mut Node, SceneError> {
        self.nodes
            .get_mut(&entity)
            .ok_or(SceneError::UnknownEntity(entity))
    }

    fn is_ancestor_of(&self, ancestor: EntityId, candidate: EntityId) -> bool {
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|node| node.parent);
        }
        false
    }

    /// Deliver to every open subscriber of `tag`, dropping closed ones.
    fn publish(&mut self, tag: &Tag, event: TagEvent) {
        if let Some(senders) = self.subscribers.get_mut(tag) {
            senders.retain(|tx| tx.send(event).is_ok());
        }
    }
}

/// Tree-structured scene with tags, rooted at a single root entity.
pub struct InMemoryScene {
    state: Mutex<SceneState>,
    replay_on_subscribe: AtomicBool,
}

impl Default for InMemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryScene {
    /// Scene containing only the root entity.
    #[must_use]
    pub fn new() -> Self {
        let root = EntityId::new(1).expect("1 is not the null id");
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                parent: None,
                tags: BTreeSet::new(),
            },
        );
        Self {
            state: Mutex::new(SceneState {
                next_id: 2,
                root,
                nodes,
                subscribers: HashMap::new(),
            }),
            replay_on_subscribe: AtomicBool::new(false),
        }
    }

    fn guard(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When set, `subscribe` first delivers `Added` for every entity that
    /// already carries the tag, like event sources that replay on connect.
    pub fn set_replay_on_subscribe(&self, replay: bool) {
        self.replay_on_subscribe.store(replay, Ordering::Relaxed);
    }

    /// Create a new entity under `parent`.
    pub fn spawn(&self, parent: EntityId) -> Result<EntityId, SceneError> {
        let mut state = self.guard();
        state.node(parent)?;
        let id = EntityId::new(state.next_id).expect("ids start above the root");
        state.next_id += 1;
        state.nodes.insert(
            id,
            Node {
                parent: Some(parent),
                tags: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    /// Tag an entity. Returns false if it already had the tag.
    pub fn add_tag(&self, entity: EntityId, tag: &Tag) -> Result<bool, SceneError> {
        let mut state = self.guard();
        let inserted = state.node_mut(entity)?.tags.insert(tag.clone());
        if inserted {
            state.publish(tag, TagEvent::Added(entity));
        }
        Ok(inserted)
    }

    /// Untag an entity. Returns false if it did not have the tag.
    pub fn remove_tag(&self, entity: EntityId, tag: &Tag) -> Result<bool, SceneError> {
        let mut state = self.guard();
        let removed = state.node_mut(entity)?.tags.remove(tag);
        if removed {
            state.publish(tag, TagEvent::Removed(entity));
        }
        Ok(removed)
    }

    /// Remove an entity and its whole subtree, publishing a removal for
    /// every tag they carried.
    pub fn despawn(&self, entity: EntityId) -> Result<(), SceneError> {
        let mut state = self.guard();
        if entity == state.root {
            return Err(SceneError::RootImmutable);
        }
        state.node(entity)?;

        let mut doomed: Vec<EntityId> = state
            .nodes
            .keys()
            .copied()
            .filter(|&candidate| state.is_ancestor_of(entity, candidate))
            .collect();
        doomed.sort();

        for id in doomed {
            if let Some(node) = state.nodes.remove(&id) {
                for tag in &node.tags {
                    state.publish(tag, TagEvent::Removed(id));
                }
            }
        }
        Ok(())
    }

    /// Move an entity (and its subtree) under a new parent.
    ///
    /// Tags are unchanged, so no tag events fire; bindings made under the
    /// old position stay until the tag is removed.
    pub fn reparent(&self, entity: EntityId, parent: EntityId) -> Result<(), SceneError> {
        let mut state = self.guard();
        if entity == state.root {
            return Err(SceneError::RootImmutable);
        }
        state.node(entity)?;
        state.node(parent)?;
        if state.is_ancestor_of(entity, parent) {
            return Err(SceneError::Cycle { entity, parent });
        }
        state.node_mut(entity)?.parent = Some(parent);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.guard().nodes.contains_key(&entity)
    }

    #[must_use]
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.guard().nodes.get(&entity).and_then(|node| node.parent)
    }

    #[must_use]
    pub fn has_tag(&self, entity: EntityId, tag: &Tag) -> bool {
        self.guard()
            .nodes
            .get(&entity)
            .is_some_and(|node| node.tags.contains(tag))
    }
}

impl SceneGraph for InMemoryScene {
    fn root(&self) -> EntityId {
        self.guard().root
    }

    fn tagged(&self, tag: &Tag) -> Vec<EntityId> {
        let state = self.guard();
        let mut entities: Vec<EntityId> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.tags.contains(tag))
            .map(|(&id, _)| id)
            .collect();
        entities.sort();
        entities
    }

    fn subscribe(&self, tag: &Tag) -> TagEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.guard();
        if self.replay_on_subscribe.load(Ordering::Relaxed) {
            let mut current: Vec<EntityId> = state
                .nodes
                .iter()
                .filter(|(_, node)| node.tags.contains(tag))
                .map(|(&id, _)| id)
                .collect();
            current.sort();
            for entity in current {
                let _ = tx.send(TagEvent::Added(entity));
            }
        }
        state.subscribers.entry(tag.clone()).or_default().push(tx);
        rx
    }

    fn is_ancestor_of(&self, ancestor: EntityId, candidate: EntityId) -> bool {
        self.guard().is_ancestor_of(ancestor, candidate)
    }
}

//! Tag event bridge: turns a class's tag stream into create/destroy calls.

use std::sync::{Arc, Weak};

use tether_types::TagEvent;

use crate::{ComponentManager, TagEventStream};
use crate::manager::Inner;
use crate::registry::ClassEntry;

/// Drive one class's bindings from its tag stream until the stream closes
/// or the manager is dropped.
///
/// Additions are scope-checked; removals always destroy, whether the entity
/// lost the tag or left the class's subtree.
pub(crate) async fn run(manager: Weak<Inner>, entry: Arc<ClassEntry>, mut stream: TagEventStream) {
    while let Some(event) = stream.recv().await {
        let Some(inner) = manager.upgrade() else {
            break;
        };
        let manager = ComponentManager::from_inner(inner);
        match event {
            TagEvent::Added(entity) => manager.on_tag_added(&entry, entity),
            TagEvent::Removed(entity) => {
                manager.destroy_in(&entry, entity);
            }
        }
    }
    tracing::debug!(component = %entry.name, tag = %entry.tag, "Tag stream closed");
}

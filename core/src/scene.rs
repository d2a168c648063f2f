//! The external scene graph the manager observes.

use tokio::sync::mpsc;

use tether_types::{EntityId, Tag, TagEvent};

/// Ordered add/remove notifications for one tag.
///
/// The stream ends when the scene drops its sender.
pub type TagEventStream = mpsc::UnboundedReceiver<TagEvent>;

/// Tag source and ancestry relation consumed by the manager.
///
/// Implementations own the entities; the manager only compares ids and asks
/// these questions.
pub trait SceneGraph: Send + Sync {
    /// Global scope root, used when a class has no ancestor of its own.
    fn root(&self) -> EntityId;

    /// Entities currently carrying `tag`, in no particular order.
    fn tagged(&self, tag: &Tag) -> Vec<EntityId>;

    /// Subscribe to future additions and removals of `tag`.
    ///
    /// A source may replay `Added` for entities that already carry the tag;
    /// the manager tolerates that.
    fn subscribe(&self, tag: &Tag) -> TagEventStream;

    /// Whether `candidate` is `ancestor` or lies beneath it.
    fn is_ancestor_of(&self, ancestor: EntityId, candidate: EntityId) -> bool;
}

//! Component lifecycle manager.
//!
//! Binds reusable behavior ("components") to entities of an external scene
//! graph that carry a tag, and lets unrelated code discover and await those
//! bindings.
//!
//! ```text
//! register(class) -> bootstrap tagged entities -> yield -> tag bridge task
//!                                                      |
//!                       TagEvent::Added / Removed -----+--> create / destroy
//!
//! wait_for_class / get_component / await_component / await_start
//!     -> woken by the manager's change signal, bounded by the shared timeout
//! ```
//!
//! All state lives in a [`ComponentManager`]; there is no process-wide
//! registry, so independent managers can coexist.

mod binding;
mod bridge;
mod component;
mod error;
mod events;
mod knobs;
mod manager;
pub mod memory;
mod registry;
mod scene;
mod wait;

pub use binding::{Binding, StartState};
pub use component::{Component, ComponentClass, Constructor, InjectFn};
pub use error::{LifecycleError, RegisterError, StartError, WaitError};
pub use events::LifecycleEvent;
pub use manager::ComponentManager;
pub use memory::InMemoryScene;
pub use scene::{SceneGraph, TagEventStream};

pub use tether_types::{ComponentName, EntityId, Tag, TagEvent};

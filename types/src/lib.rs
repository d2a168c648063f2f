//! Core domain types for tether.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Entity identities, case-insensitive component names, tags, and the tag events
//! emitted by a scene graph all live here so every layer agrees on them.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
mod name;
mod tag;

pub use ids::{EntityId, NullEntityError};
pub use name::{ComponentName, InvalidName};
pub use tag::{InvalidTag, Tag, TagEvent};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EntityId;

/// External label selecting which entities a component class applies to.
///
/// Tags are compared exactly (case-sensitive), the way the scene graph
/// stores them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tag must not be empty")]
pub struct InvalidTag;

impl Tag {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidTag> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(InvalidTag)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = InvalidTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Tag {
    type Error = InvalidTag;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A change to the set of entities carrying a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEvent {
    /// The entity gained the tag.
    Added(EntityId),
    /// The entity lost the tag (or left the graph).
    Removed(EntityId),
}

impl TagEvent {
    #[must_use]
    pub fn entity(self) -> EntityId {
        match self {
            Self::Added(entity) | Self::Removed(entity) => entity,
        }
    }
}

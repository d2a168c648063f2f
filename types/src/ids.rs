use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of one entity in the external scene graph.
///
/// The raw value `0` is the null identity and cannot be represented; every
/// `EntityId` in circulation refers to a real entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct EntityId(NonZeroU64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("entity id 0 is the null identity")]
pub struct NullEntityError;

impl EntityId {
    /// Wrap a raw id, rejecting the null identity.
    pub fn new(raw: u64) -> Result<Self, NullEntityError> {
        NonZeroU64::new(raw).map(Self).ok_or(NullEntityError)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0.get()
    }
}

impl TryFrom<u64> for EntityId {
    type Error = NullEntityError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for u64 {
    fn from(value: EntityId) -> Self {
        value.value()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

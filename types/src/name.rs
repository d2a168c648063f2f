use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Case-insensitive component class name.
///
/// The spelling given at construction is kept for display; equality, ordering
/// and hashing use the lowercased key, so `"Door"` and `"door"` name the same
/// class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentName {
    display: String,
    key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("component name must not be empty")]
pub struct InvalidName;

impl ComponentName {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidName> {
        let display = value.into();
        let trimmed = display.trim();
        if trimmed.is_empty() {
            return Err(InvalidName);
        }
        let key = trimmed.to_lowercase();
        Ok(Self {
            display: trimmed.to_string(),
            key,
        })
    }

    /// The name as it was spelled at registration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The normalized (lowercased) lookup key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for ComponentName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ComponentName {}

impl Hash for ComponentName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ComponentName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

// Hash/Eq agree with `str` on the key, so maps keyed by `ComponentName`
// can be looked up with an already-normalized `&str`.
impl Borrow<str> for ComponentName {
    fn borrow(&self) -> &str {
        &self.key
    }
}

impl TryFrom<String> for ComponentName {
    type Error = InvalidName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ComponentName {
    type Error = InvalidName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ComponentName> for String {
    fn from(value: ComponentName) -> Self {
        value.display
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

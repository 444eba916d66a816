//! Entity identifier.

use serde::{Deserialize, Serialize};

/// Key of one data point. Stable across every mapping in a run.
///
/// Ids are strings on the wire (JSON object keys), whether they came from a
/// row-id file or were derived from a matrix row index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Ids for rows `0..n`, in row order.
    pub fn sequential(n: usize) -> Vec<EntityId> {
        (0..n).map(EntityId::from).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<usize> for EntityId {
    fn from(i: usize) -> Self {
        Self(i.to_string())
    }
}

impl std::borrow::Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

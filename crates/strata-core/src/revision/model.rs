//! Revision model: identity, dependencies, scripts and content checksum.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a revision's scripts.
///
/// Stored in the tracking table when a revision is applied so later runs can
/// notice that an applied definition was edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Digest the forward script and, when present, the reverse script.
    ///
    /// The two parts are length-prefixed so moving text between them changes
    /// the checksum.
    pub fn of_scripts(forward: &str, reverse: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((forward.len() as u64).to_be_bytes());
        hasher.update(forward.as_bytes());
        if let Some(reverse) = reverse {
            hasher.update((reverse.len() as u64).to_be_bytes());
            hasher.update(reverse.as_bytes());
        }
        Checksum(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One discrete schema change with declared dependencies.
///
/// Immutable once loaded for a run; the checksum is derived from the scripts
/// at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub description: Option<String>,
    pub dependencies: BTreeSet<String>,
    pub forward_sql: String,
    pub reverse_sql: Option<String>,
    checksum: Checksum,
}

impl Revision {
    pub fn new<I, S>(id: impl Into<String>, dependencies: I, forward_sql: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forward_sql = forward_sql.into();
        Self {
            id: id.into(),
            description: None,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            checksum: Checksum::of_scripts(&forward_sql, None),
            forward_sql,
            reverse_sql: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reverse_sql(mut self, reverse_sql: impl Into<String>) -> Self {
        self.reverse_sql = Some(reverse_sql.into());
        self.checksum = Checksum::of_scripts(&self.forward_sql, self.reverse_sql.as_deref());
        self
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

//! Rows of the applied-revision tracking table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Outcome stored alongside an application record.
///
/// Only successful applications are ever written; the column exists so the
/// table can be read by other tooling without guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Applied,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Applied => "applied",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applied" => Ok(RecordStatus::Applied),
            other => Err(StateError::Query(format!(
                "unknown record status in tracking table: {other}"
            ))),
        }
    }
}

/// One applied revision, as persisted in the target database.
///
/// Records are append-only: written in the same transaction as the
/// revision's forward script and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub revision_id: String,
    /// Checksum of the revision definition at the time it was applied
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub status: RecordStatus,
}

impl ApplicationRecord {
    /// Build a record for a revision applied right now.
    pub fn applied_now(revision_id: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            revision_id: revision_id.into(),
            checksum: checksum.into(),
            applied_at: Utc::now(),
            status: RecordStatus::Applied,
        }
    }
}

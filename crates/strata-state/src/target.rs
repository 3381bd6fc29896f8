//! Target database abstraction
//!
//! `MigrationTarget` is the seam between the apply engine and a concrete
//! database. It covers two concerns:
//! - the applied-revision history (the tracking table), and
//! - executing one revision's forward script together with its history row
//!   as a single transaction.
//!
//! A SQLite implementation lives in `sqlite`; an in-memory fake for tests
//! lives in `fakes`.

use std::collections::BTreeSet;

use crate::error::StateError;
use crate::record::ApplicationRecord;

/// Result type for target operations
pub type StateResult<T> = std::result::Result<T, StateError>;

/// One forward script to run, with the identity it is recorded under.
#[derive(Debug, Clone, Copy)]
pub struct ScriptRun<'a> {
    pub revision_id: &'a str,
    pub forward_sql: &'a str,
    pub checksum: &'a str,
}

/// A relational database that revisions are applied to.
///
/// Guarantees:
/// - `apply` is atomic: either the script's effects and the history row are
///   both committed, or neither is. A failing script yields
///   `StateError::ScriptExecution` and leaves the database untouched.
/// - `applied_records` returns an empty list when the tracking table has not
///   been created yet.
/// - Calls are strictly sequential; implementations need no internal locking.
pub trait MigrationTarget: Send {
    /// Human-readable name of the target, used in logs and prompts.
    fn describe(&self) -> String;

    /// Create the tracking table if it does not exist. Idempotent.
    fn ensure_history(&mut self) -> StateResult<()>;

    /// All application records, oldest first.
    fn applied_records(&mut self) -> StateResult<Vec<ApplicationRecord>>;

    /// Whether a history row exists for `revision_id`.
    fn is_applied(&mut self, revision_id: &str) -> StateResult<bool>;

    /// Execute the forward script and record it, in one transaction.
    fn apply(&mut self, script: &ScriptRun<'_>) -> StateResult<ApplicationRecord>;

    /// Identifiers of all applied revisions.
    fn applied_set(&mut self) -> StateResult<BTreeSet<String>> {
        Ok(self
            .applied_records()?
            .into_iter()
            .map(|r| r.revision_id)
            .collect())
    }
}

//! In-memory fakes for the target trait (testing only)
//!
//! `MemoryTarget` satisfies the `MigrationTarget` contract without a real
//! database. Scripts are not interpreted; failures are injected per revision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::StateError;
use crate::record::ApplicationRecord;
use crate::target::{MigrationTarget, ScriptRun, StateResult};

// ---------------------------------------------------------------------------
// MemoryTarget
// ---------------------------------------------------------------------------

/// In-memory target backed by a `Vec<ApplicationRecord>`.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    history_ready: bool,
    records: Vec<ApplicationRecord>,
    executed: Vec<String>,
    script_failures: BTreeMap<String, String>,
    connection_failures: BTreeMap<String, String>,
}

impl MemoryTarget {
    /// A target whose tracking table already exists.
    pub fn new() -> Self {
        Self {
            history_ready: true,
            ..Self::default()
        }
    }

    /// A target that has never been set up.
    pub fn without_history() -> Self {
        Self::default()
    }

    /// Make the forward script of `revision_id` fail with `message`.
    pub fn fail_script(mut self, revision_id: &str, message: &str) -> Self {
        self.script_failures
            .insert(revision_id.to_string(), message.to_string());
        self
    }

    /// Make the connection drop when `revision_id` is applied.
    pub fn fail_connection(mut self, revision_id: &str, message: &str) -> Self {
        self.connection_failures
            .insert(revision_id.to_string(), message.to_string());
        self
    }

    /// Seed a history row directly, bypassing script execution.
    pub fn with_record(mut self, revision_id: &str, checksum: &str) -> Self {
        self.history_ready = true;
        self.records
            .push(ApplicationRecord::applied_now(revision_id, checksum));
        self
    }

    /// Seed a history row with an explicit application time.
    pub fn with_record_at(
        mut self,
        revision_id: &str,
        checksum: &str,
        applied_at: DateTime<Utc>,
    ) -> Self {
        let mut record = ApplicationRecord::applied_now(revision_id, checksum);
        record.applied_at = applied_at;
        self.history_ready = true;
        self.records.push(record);
        self
    }

    /// Revisions whose scripts were executed and committed, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }
}

impl MigrationTarget for MemoryTarget {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    fn ensure_history(&mut self) -> StateResult<()> {
        self.history_ready = true;
        Ok(())
    }

    fn applied_records(&mut self) -> StateResult<Vec<ApplicationRecord>> {
        Ok(self.records.clone())
    }

    fn is_applied(&mut self, revision_id: &str) -> StateResult<bool> {
        Ok(self.records.iter().any(|r| r.revision_id == revision_id))
    }

    fn apply(&mut self, script: &ScriptRun<'_>) -> StateResult<ApplicationRecord> {
        if !self.history_ready {
            return Err(StateError::SchemaSetup(
                "tracking table does not exist; run setup first".to_string(),
            ));
        }
        if let Some(message) = self.connection_failures.get(script.revision_id) {
            return Err(StateError::Connection(message.clone()));
        }
        if let Some(message) = self.script_failures.get(script.revision_id) {
            return Err(StateError::ScriptExecution {
                revision: script.revision_id.to_string(),
                message: message.clone(),
            });
        }
        if self.is_applied(script.revision_id)? {
            return Err(StateError::AlreadyRecorded(script.revision_id.to_string()));
        }

        let record = ApplicationRecord::applied_now(script.revision_id, script.checksum);
        self.executed.push(script.revision_id.to_string());
        self.records.push(record.clone());
        Ok(record)
    }
}

//! SQLite target - connection and transactional revision application.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, instrument};

use crate::error::StateError;
use crate::history::HistoryTable;
use crate::profile::ConnectionProfile;
use crate::record::ApplicationRecord;
use crate::target::{MigrationTarget, ScriptRun, StateResult};

/// A SQLite database that revisions are applied to.
///
/// Forward scripts run through `execute_batch` inside a transaction opened
/// by this type, so they must not contain their own `BEGIN`/`COMMIT`.
pub struct SqliteTarget {
    conn: Connection,
    history: HistoryTable,
    label: String,
}

impl SqliteTarget {
    /// Open the database described by a `sqlite` profile.
    #[instrument(skip_all, fields(environment = %profile.name))]
    pub fn connect(profile: &ConnectionProfile) -> StateResult<Self> {
        if !profile.is_sqlite() {
            return Err(StateError::UnsupportedDialect(profile.dialect.clone()));
        }
        let database = profile.database.as_deref().ok_or_else(|| {
            StateError::Config(format!(
                "environment '{}' has no database path",
                profile.name
            ))
        })?;

        let mut target = if database == ":memory:" {
            Self::open_in_memory()?
        } else {
            Self::open_path(Path::new(database))?
        };
        target.label = profile.to_string();
        info!(target = %target.label, "connected");
        Ok(target)
    }

    /// Open (creating if needed) a database file.
    pub fn open_path(path: &Path) -> StateResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            StateError::Connection(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self::from_connection(conn, format!("sqlite:///{}", path.display())))
    }

    pub fn open_in_memory() -> StateResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| StateError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn, "sqlite:///:memory:".to_string()))
    }

    fn from_connection(conn: Connection, label: String) -> Self {
        Self {
            conn,
            history: HistoryTable::default(),
            label,
        }
    }

    /// Track applications in a custom table instead of the default one.
    pub fn with_history_table(mut self, history: HistoryTable) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &HistoryTable {
        &self.history
    }

    /// Raw connection, for inspecting the schema a run produced.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl MigrationTarget for SqliteTarget {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn ensure_history(&mut self) -> StateResult<()> {
        self.history.create(&self.conn)
    }

    fn applied_records(&mut self) -> StateResult<Vec<ApplicationRecord>> {
        self.history.applied_records(&self.conn)
    }

    fn is_applied(&mut self, revision_id: &str) -> StateResult<bool> {
        self.history.is_applied(&self.conn, revision_id)
    }

    #[instrument(skip(self, script), fields(revision = %script.revision_id))]
    fn apply(&mut self, script: &ScriptRun<'_>) -> StateResult<ApplicationRecord> {
        if !self.history.exists(&self.conn)? {
            return Err(StateError::SchemaSetup(format!(
                "tracking table {} does not exist; run setup first",
                self.history.table()
            )));
        }

        // Dropping `tx` on any early return rolls it back.
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StateError::Connection(format!("Failed to begin transaction: {}", e)))?;

        debug!("executing forward script");
        tx.execute_batch(script.forward_sql)
            .map_err(|e| StateError::ScriptExecution {
                revision: script.revision_id.to_string(),
                message: e.to_string(),
            })?;

        let record = self
            .history
            .record_applied(&tx, script.revision_id, script.checksum)?;

        tx.commit()
            .map_err(|e| StateError::Transaction(format!("Commit failed: {}", e)))?;
        debug!("committed");
        Ok(record)
    }
}

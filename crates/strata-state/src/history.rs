//! Applied-revision tracking table
//!
//! The history lives inside the target database so that it survives across
//! process runs and travels with the schema it describes. Every function
//! here takes a `&Connection`; passing a `&Transaction` (which derefs to a
//! connection) keeps the history write inside the caller's transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::StateError;
use crate::record::{ApplicationRecord, RecordStatus};
use crate::target::StateResult;

/// Default name of the tracking table
pub const DEFAULT_HISTORY_TABLE: &str = "strata_revisions";

/// Handle to the tracking table of one target database.
///
/// Schema:
/// ```text
/// TABLE strata_revisions {
///   revision:    TEXT (primary key)
///   checksum:    TEXT
///   applied_at:  TEXT (RFC 3339, UTC, fixed nanosecond width)
///   status:      TEXT ("applied")
/// }
/// ```
///
/// Rows are append-only; nothing in strata updates or deletes them.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    table: String,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }
}

impl HistoryTable {
    /// Use a custom table name. Only ASCII letters, digits and `_` are
    /// accepted since the name is spliced into SQL.
    pub fn named(table: impl Into<String>) -> StateResult<Self> {
        let table = table.into();
        let valid = !table.is_empty()
            && !table.starts_with(|c: char| c.is_ascii_digit())
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(StateError::SchemaSetup(format!(
                "invalid tracking table name: {table:?}"
            )));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the tracking table. Safe to call multiple times.
    pub fn create(&self, conn: &Connection) -> StateResult<()> {
        debug!(table = %self.table, "Initializing tracking table");
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                revision   TEXT PRIMARY KEY NOT NULL,
                checksum   TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                status     TEXT NOT NULL
            );",
            self.table
        );
        conn.execute_batch(&sql)
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
        info!(table = %self.table, "tracking table initialized");
        Ok(())
    }

    /// Whether the tracking table exists yet.
    pub fn exists(&self, conn: &Connection) -> StateResult<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn is_applied(&self, conn: &Connection, revision_id: &str) -> StateResult<bool> {
        if !self.exists(conn)? {
            return Ok(false);
        }
        let sql = format!("SELECT 1 FROM {} WHERE revision = ?1", self.table);
        let hit: Option<i64> = conn
            .query_row(&sql, params![revision_id], |row| row.get(0))
            .optional()?;
        Ok(hit.is_some())
    }

    /// Append a row for `revision_id`.
    ///
    /// Must be called with the same transaction that executed the revision's
    /// forward script.
    pub fn record_applied(
        &self,
        conn: &Connection,
        revision_id: &str,
        checksum: &str,
    ) -> StateResult<ApplicationRecord> {
        if self.is_applied(conn, revision_id)? {
            return Err(StateError::AlreadyRecorded(revision_id.to_string()));
        }
        let record = ApplicationRecord::applied_now(revision_id, checksum);
        let sql = format!(
            "INSERT INTO {} (revision, checksum, applied_at, status) VALUES (?1, ?2, ?3, ?4)",
            self.table
        );
        conn.execute(
            &sql,
            params![
                record.revision_id,
                record.checksum,
                record.applied_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                record.status.as_str(),
            ],
        )?;
        debug!(revision = %revision_id, "recorded application");
        Ok(record)
    }

    /// All rows, oldest first. Empty when the table does not exist.
    pub fn applied_records(&self, conn: &Connection) -> StateResult<Vec<ApplicationRecord>> {
        if !self.exists(conn)? {
            debug!(table = %self.table, "tracking table missing; treating history as empty");
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT revision, checksum, applied_at, status FROM {} ORDER BY applied_at, revision",
            self.table
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (revision_id, checksum, applied_at, status) = row?;
            let applied_at = DateTime::parse_from_rfc3339(&applied_at)
                .map_err(|e| {
                    StateError::Query(format!(
                        "bad applied_at for revision {revision_id}: {e}"
                    ))
                })?
                .with_timezone(&Utc);
            records.push(ApplicationRecord {
                revision_id,
                checksum,
                applied_at,
                status: status.parse::<RecordStatus>()?,
            });
        }
        Ok(records)
    }
}

//! Strata-State: target database access for strata
//!
//! This crate is the persistence layer of strata. It owns every interaction
//! with the database that revisions are applied to.
//!
//! ## Key Components
//!
//! - `MigrationTarget`: the trait the apply engine drives (history reads and
//!   atomic script + history writes)
//! - `SqliteTarget`: the SQLite implementation
//! - `HistoryTable`: the applied-revision tracking table
//! - `ConnectionProfile` / `ProfileSet`: environments from the YAML config
//! - `fakes::MemoryTarget`: in-memory target for tests

mod error;
pub mod fakes;
mod history;
mod profile;
mod record;
mod sqlite;
pub mod target;

pub use error::StateError;
pub use history::{HistoryTable, DEFAULT_HISTORY_TABLE};
pub use profile::{ConnectionProfile, ProfileSet, DEFAULT_ENVIRONMENT};
pub use record::{ApplicationRecord, RecordStatus};
pub use sqlite::SqliteTarget;
pub use target::{MigrationTarget, ScriptRun, StateResult};

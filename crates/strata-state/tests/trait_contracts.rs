//! Trait contract tests for MigrationTarget.
//!
//! Every conforming implementation must pass these. They run against the
//! in-memory fake and against an in-memory SQLite database.

use strata_state::fakes::MemoryTarget;
use strata_state::{MigrationTarget, ScriptRun, SqliteTarget, StateError};

const GOOD_SQL: &str = "CREATE TABLE accounts (id INTEGER PRIMARY KEY);";

fn run<'a>(id: &'a str, sql: &'a str) -> ScriptRun<'a> {
    ScriptRun {
        revision_id: id,
        forward_sql: sql,
        checksum: "0123abcd",
    }
}

fn targets() -> Vec<(&'static str, Box<dyn MigrationTarget>)> {
    vec![
        ("memory", Box::new(MemoryTarget::new())),
        ("sqlite", {
            let mut t = SqliteTarget::open_in_memory().unwrap();
            t.ensure_history().unwrap();
            Box::new(t)
        }),
    ]
}

// ===========================================================================
// History reads
// ===========================================================================

#[test]
fn fresh_target_has_empty_history() {
    for (name, mut target) in targets() {
        assert!(target.applied_records().unwrap().is_empty(), "{name}");
        assert!(target.applied_set().unwrap().is_empty(), "{name}");
        assert!(!target.is_applied("anything").unwrap(), "{name}");
    }
}

#[test]
fn ensure_history_is_idempotent() {
    for (name, mut target) in targets() {
        target.ensure_history().unwrap();
        target.ensure_history().unwrap();
        assert!(target.applied_records().unwrap().is_empty(), "{name}");
    }
}

// ===========================================================================
// Atomic apply
// ===========================================================================

#[test]
fn apply_records_revision_with_checksum() {
    for (name, mut target) in targets() {
        let record = target.apply(&run("accounts", GOOD_SQL)).unwrap();
        assert_eq!(record.revision_id, "accounts", "{name}");
        assert_eq!(record.checksum, "0123abcd", "{name}");
        assert!(target.is_applied("accounts").unwrap(), "{name}");
        assert!(target.applied_set().unwrap().contains("accounts"), "{name}");
    }
}

#[test]
fn apply_twice_is_rejected() {
    for (name, mut target) in targets() {
        target.apply(&run("accounts", GOOD_SQL)).unwrap();
        let err = target.apply(&run("accounts", GOOD_SQL)).unwrap_err();
        // SQLite rejects the re-run script itself; the fake rejects the record.
        assert!(
            matches!(
                err,
                StateError::AlreadyRecorded(_) | StateError::ScriptExecution { .. }
            ),
            "{name}: {err}"
        );
        assert_eq!(target.applied_records().unwrap().len(), 1, "{name}");
    }
}

#[test]
fn records_come_back_oldest_first() {
    for (name, mut target) in targets() {
        target.apply(&run("first", "CREATE TABLE a (id INTEGER);")).unwrap();
        target.apply(&run("second", "CREATE TABLE b (id INTEGER);")).unwrap();
        let ids: Vec<String> = target
            .applied_records()
            .unwrap()
            .into_iter()
            .map(|r| r.revision_id)
            .collect();
        assert_eq!(ids, vec!["first", "second"], "{name}");
    }
}

#[test]
fn failed_script_leaves_no_history_row() {
    let mut memory = MemoryTarget::new().fail_script("broken", "syntax error");
    let mut sqlite = SqliteTarget::open_in_memory().unwrap();
    sqlite.ensure_history().unwrap();

    let cases: Vec<(&str, &mut dyn MigrationTarget)> =
        vec![("memory", &mut memory), ("sqlite", &mut sqlite)];
    for (name, target) in cases {
        let err = target
            .apply(&run("broken", "CREATE TABLE ok (id INTEGER); SELEKT 1;"))
            .unwrap_err();
        assert!(
            matches!(err, StateError::ScriptExecution { .. }),
            "{name}: {err}"
        );
        assert!(!target.is_applied("broken").unwrap(), "{name}");
    }
}

#[test]
fn apply_before_setup_fails_without_effect() {
    let mut memory = MemoryTarget::without_history();
    let mut sqlite = SqliteTarget::open_in_memory().unwrap();

    let cases: Vec<(&str, &mut dyn MigrationTarget)> =
        vec![("memory", &mut memory), ("sqlite", &mut sqlite)];
    for (name, target) in cases {
        let err = target.apply(&run("accounts", GOOD_SQL)).unwrap_err();
        assert!(matches!(err, StateError::SchemaSetup(_)), "{name}: {err}");
        assert!(target.applied_records().unwrap().is_empty(), "{name}");
    }
}

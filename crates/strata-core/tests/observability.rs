//! Observability tests for apply run tracing.
//!
//! These tests verify that structured tracing events are emitted for the run
//! lifecycle and for history findings.

use std::sync::Arc;

use strata_core::apply::{ApplyEngine, AutoApprove, ConfirmMode, RunContext};
use strata_core::graph::RevisionGraph;
use strata_core::obs::{
    emit_checksum_drift, emit_connection_warning, emit_run_finished, emit_run_started,
    emit_unknown_applied,
};
use strata_core::revision::Revision;
use strata_core::RunSpan;
use strata_state::fakes::MemoryTarget;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_counts() {
    emit_run_started("run-123", "sqlite:///dev.db", 2, 5);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("pending=2"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_state() {
    emit_run_finished("run-456", "aborted", 1, 12);
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("aborted"));
}

#[traced_test]
#[test]
fn test_history_findings_are_warnings() {
    emit_checksum_drift("add_users", "aaaa", "bbbb");
    emit_unknown_applied("retired_index");
    assert!(logs_contain("WARN"));
    assert!(logs_contain("history.checksum_drift"));
    assert!(logs_contain("retired_index"));
}

#[traced_test]
#[test]
fn test_connection_warning_names_environment() {
    emit_connection_warning("production", "this is the live database");
    assert!(logs_contain("connection.warning"));
    assert!(logs_contain("production"));
}

#[traced_test]
#[tokio::test]
async fn test_run_span_carries_run_id() {
    let span = RunSpan::new("span-run-1");
    span.instrument(async { tracing::info!("inside run") }).await;
    assert!(logs_contain("span-run-1"));
}

#[traced_test]
#[tokio::test]
async fn test_engine_run_emits_lifecycle_events() {
    let graph = RevisionGraph::build(vec![
        Revision::new("a", Vec::<String>::new(), "A"),
        Revision::new("b", ["a"], "B"),
    ])
    .unwrap();
    let mut target = MemoryTarget::new().with_record("a", "drifted-checksum");
    let engine = ApplyEngine::new(Arc::new(AutoApprove), ConfirmMode::EachRevision);
    let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();

    assert!(report.is_completed());
    assert!(logs_contain("run.started"));
    assert!(logs_contain("revision.applied"));
    assert!(logs_contain("history.checksum_drift"));
    assert!(logs_contain(&report.run_id));
}

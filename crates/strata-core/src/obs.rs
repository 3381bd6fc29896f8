//! Structured observability hooks for apply runs.
//!
//! This module provides:
//! - `RunSpan`, a span tagged with the run id that instruments a run's future
//! - Emission functions for the run lifecycle and history findings
//!
//! Events are emitted at `info!` (lifecycle), `debug!` (per revision) and
//! `warn!` (history findings). Filtering follows `RUST_LOG`.

use std::future::Future;

use tracing::instrument::Instrumented;
use tracing::{debug, info, warn, Instrument, Span};

/// Span tagged with the run id for the duration of an apply run.
///
/// # Example
///
/// ```ignore
/// let span = RunSpan::new("3f1c...");
/// span.instrument(async { /* run */ }).await;
/// ```
pub struct RunSpan {
    span: Span,
}

impl RunSpan {
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("strata.apply", run_id = %run_id),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `fut` inside this span.
    pub fn instrument<F: Future>(&self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span.clone())
    }
}

pub fn emit_run_started(run_id: &str, target: &str, pending: usize, total: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        target = %target,
        pending = pending,
        total = total,
    );
}

pub fn emit_run_finished(run_id: &str, state: &str, applied: usize, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        state = %state,
        applied = applied,
        duration_ms = duration_ms,
    );
}

pub fn emit_revision_skipped(revision: &str) {
    debug!(event = "revision.skipped", revision = %revision);
}

pub fn emit_revision_applied(revision: &str, checksum: &str) {
    info!(event = "revision.applied", revision = %revision, checksum = %checksum);
}

pub fn emit_revision_declined(revision: &str, cancelled: bool) {
    info!(event = "revision.declined", revision = %revision, cancelled = cancelled);
}

/// Script or target failure (warning level).
pub fn emit_revision_failed(revision: &str, error: &dyn std::fmt::Display) {
    warn!(event = "revision.failed", revision = %revision, error = %error);
}

pub fn emit_checksum_drift(revision: &str, recorded: &str, current: &str) {
    warn!(
        event = "history.checksum_drift",
        revision = %revision,
        recorded = %recorded,
        current = %current,
        "applied revision was edited after it was applied"
    );
}

pub fn emit_unknown_applied(revision: &str) {
    warn!(
        event = "history.unknown_revision",
        revision = %revision,
        "tracking table lists a revision with no active definition"
    );
}

pub fn emit_connection_warning(environment: &str, notice: &str) {
    warn!(event = "connection.warning", environment = %environment, notice = %notice);
}

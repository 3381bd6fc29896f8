//! Text and JSON output, and the mapping from outcomes to exit codes.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::process::ExitCode;

use serde::Serialize;
use strata_core::apply::{AbortReason, ApplyError, ApplyReport, RevisionState};
use strata_core::graph::{GraphError, Layer};
use strata_core::revision::RevisionError;
use strata_state::StateError;

pub const EXIT_OK: u8 = 0;
pub const EXIT_OTHER: u8 = 1;
pub const EXIT_STRUCTURAL: u8 = 2;
pub const EXIT_DECLINED: u8 = 3;
pub const EXIT_SCRIPT_FAILED: u8 = 4;
pub const EXIT_CONNECTIVITY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct LayerEntry<'a> {
    id: &'a str,
    applied: bool,
}

#[derive(Debug, Serialize)]
struct LayerView<'a> {
    index: usize,
    revisions: Vec<LayerEntry<'a>>,
}

/// `\tLayer N: a, b (applied)` lines, one per layer, then a blank line.
pub fn layers_text(title: &str, layers: &[Layer], applied: &BTreeSet<String>) -> String {
    let mut out = format!("{title}\n");
    for layer in layers {
        let names: Vec<String> = layer
            .revisions
            .iter()
            .map(|id| {
                if applied.contains(id) {
                    format!("{id} (applied)")
                } else {
                    id.clone()
                }
            })
            .collect();
        let _ = writeln!(out, "\tLayer {}: {}", layer.index, names.join(", "));
    }
    out.push('\n');
    out
}

pub fn layers_json(layers: &[Layer], applied: &BTreeSet<String>) -> serde_json::Result<String> {
    let view: Vec<LayerView<'_>> = layers
        .iter()
        .map(|layer| LayerView {
            index: layer.index,
            revisions: layer
                .revisions
                .iter()
                .map(|id| LayerEntry {
                    id,
                    applied: applied.contains(id),
                })
                .collect(),
        })
        .collect();
    serde_json::to_string_pretty(&view)
}

/// Layers with applied revisions removed and empty layers dropped,
/// renumbered from zero.
pub fn pending_layers(layers: &[Layer], applied: &BTreeSet<String>) -> Vec<Layer> {
    layers
        .iter()
        .map(|layer| {
            layer
                .revisions
                .iter()
                .filter(|id| !applied.contains(*id))
                .cloned()
                .collect::<Vec<_>>()
        })
        .filter(|revisions| !revisions.is_empty())
        .enumerate()
        .map(|(index, revisions)| Layer { index, revisions })
        .collect()
}

fn state_label(state: RevisionState) -> &'static str {
    match state {
        RevisionState::Pending => "not attempted",
        RevisionState::Skipped => "already applied",
        RevisionState::AwaitingConfirmation => "awaiting confirmation",
        RevisionState::Applying => "applying",
        RevisionState::Applied => "applied",
        RevisionState::Declined => "declined",
        RevisionState::Failed => "FAILED",
    }
}

pub fn report_text(report: &ApplyReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let _ = write!(
            out,
            "  [layer {}] {:<32} {}",
            outcome.layer,
            outcome.revision,
            state_label(outcome.state)
        );
        if let Some(detail) = &outcome.detail {
            let _ = write!(out, ": {detail}");
        }
        out.push('\n');
    }
    for drift in &report.drift {
        let _ = writeln!(
            out,
            "warning: {} changed after it was applied (recorded {}, now {})",
            drift.revision,
            short(&drift.recorded),
            short(&drift.current)
        );
    }
    for unknown in &report.unknown_applied {
        let _ = writeln!(out, "warning: {unknown} is applied but has no active definition");
    }

    let summary = match &report.abort {
        None => format!(
            "completed: {} applied, {} already applied",
            report.applied_count(),
            report.skipped_count()
        ),
        Some(reason) => {
            let why = match reason {
                AbortReason::Declined { revision: Some(id) } => format!("declined at {id}"),
                AbortReason::Declined { revision: None } => "plan declined".to_string(),
                AbortReason::Cancelled { revision: Some(id) } => format!("cancelled at {id}"),
                AbortReason::Cancelled { revision: None } => "plan cancelled".to_string(),
                AbortReason::ScriptFailed { revision, .. } => {
                    format!("script failed in {revision}")
                }
                AbortReason::TargetFailed { revision, .. } => {
                    format!("target failed while applying {revision}")
                }
            };
            format!(
                "aborted ({why}): {} applied before the abort",
                report.applied_count()
            )
        }
    };
    let _ = writeln!(out, "{summary}");
    out
}

fn short(checksum: &str) -> &str {
    &checksum[..12.min(checksum.len())]
}

pub fn report_exit_code(report: &ApplyReport) -> u8 {
    match &report.abort {
        None => EXIT_OK,
        Some(AbortReason::Declined { .. }) | Some(AbortReason::Cancelled { .. }) => EXIT_DECLINED,
        Some(AbortReason::ScriptFailed { .. }) => EXIT_SCRIPT_FAILED,
        Some(AbortReason::TargetFailed { .. }) => EXIT_CONNECTIVITY,
    }
}

fn state_exit_code(err: &StateError) -> u8 {
    match err {
        StateError::ScriptExecution { .. } => EXIT_SCRIPT_FAILED,
        StateError::Connection(_)
        | StateError::Config(_)
        | StateError::EnvironmentNotFound(_)
        | StateError::UnsupportedDialect(_)
        | StateError::SchemaSetup(_) => EXIT_CONNECTIVITY,
        _ => EXIT_OTHER,
    }
}

/// Exit code for an error that ended a command.
pub fn error_exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<GraphError>().is_some() {
        return EXIT_STRUCTURAL;
    }
    if let Some(err) = err.downcast_ref::<ApplyError>() {
        return match err {
            ApplyError::State(state) => state_exit_code(state),
            _ => EXIT_STRUCTURAL,
        };
    }
    if let Some(err) = err.downcast_ref::<RevisionError>() {
        return match err {
            RevisionError::Malformed { .. } | RevisionError::EmptyScript { .. } => {
                EXIT_STRUCTURAL
            }
            _ => EXIT_OTHER,
        };
    }
    if let Some(err) = err.downcast_ref::<StateError>() {
        return state_exit_code(err);
    }
    EXIT_OTHER
}

pub fn exit_code(code: u8) -> ExitCode {
    ExitCode::from(code)
}

//! Run and per-revision states, and the report an apply run produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::apply::engine::ConfirmMode;
use crate::apply::history::ChecksumDrift;

/// Lifecycle of one apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

/// Lifecycle of one revision within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionState {
    Pending,
    Skipped,
    AwaitingConfirmation,
    Applying,
    Applied,
    Declined,
    Failed,
}

impl RevisionState {
    /// States a revision can end a completed run in.
    pub fn is_settled(&self) -> bool {
        matches!(self, RevisionState::Applied | RevisionState::Skipped)
    }
}

/// Final state of one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionOutcome {
    pub revision: String,
    pub layer: usize,
    pub state: RevisionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Why a run stopped early. `revision` is `None` when the whole plan was
/// refused before anything ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    Declined { revision: Option<String> },
    Cancelled { revision: Option<String> },
    ScriptFailed { revision: String, message: String },
    TargetFailed { revision: String, message: String },
}

impl AbortReason {
    pub fn revision(&self) -> Option<&str> {
        match self {
            AbortReason::Declined { revision } | AbortReason::Cancelled { revision } => {
                revision.as_deref()
            }
            AbortReason::ScriptFailed { revision, .. }
            | AbortReason::TargetFailed { revision, .. } => Some(revision),
        }
    }
}

/// Everything an apply run did, in visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub run_id: String,
    pub target: String,
    pub mode: ConfirmMode,
    pub state: RunState,
    pub outcomes: Vec<RevisionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortReason>,
    pub drift: Vec<ChecksumDrift>,
    pub unknown_applied: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ApplyReport {
    pub(crate) fn new(run_id: String, target: String, mode: ConfirmMode) -> Self {
        Self {
            run_id,
            target,
            mode,
            state: RunState::NotStarted,
            outcomes: Vec::new(),
            abort: None,
            drift: Vec::new(),
            unknown_applied: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn outcome(&self, revision: &str) -> Option<&RevisionOutcome> {
        self.outcomes.iter().find(|o| o.revision == revision)
    }

    pub fn state_of(&self, revision: &str) -> Option<RevisionState> {
        self.outcome(revision).map(|o| o.state)
    }

    fn ids_in(&self, state: RevisionState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.revision.as_str())
            .collect()
    }

    /// Revisions applied by this run, in order.
    pub fn applied(&self) -> Vec<&str> {
        self.ids_in(RevisionState::Applied)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_in(RevisionState::Skipped)
    }

    pub fn applied_count(&self) -> usize {
        self.applied().len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().len()
    }

    /// Revisions never reached because the run stopped early.
    pub fn not_attempted(&self) -> Vec<&str> {
        self.ids_in(RevisionState::Pending)
    }

    pub(crate) fn set_state(&mut self, index: usize, state: RevisionState, detail: Option<String>) {
        if let Some(outcome) = self.outcomes.get_mut(index) {
            outcome.state = state;
            if detail.is_some() {
                outcome.detail = detail;
            }
        }
    }

    pub(crate) fn finish(&mut self, abort: Option<AbortReason>) {
        self.state = if abort.is_some() {
            RunState::Aborted
        } else {
            RunState::Completed
        };
        self.abort = abort;
        self.finished_at = Some(Utc::now());
    }
}

//! Applying pending revisions to a target under operator confirmation.
//!
//! - [`engine`]: the run state machine
//! - [`confirm`]: the confirmation capability and its stock implementations
//! - [`history`]: downward-closure and drift checks on applied history
//! - [`report`]: run/revision states and the final report

pub mod confirm;
pub mod context;
pub mod engine;
pub mod error;
pub mod history;
pub mod report;

pub use confirm::{AutoApprove, ConfirmationRequest, Confirmer, Decision, ScriptedConfirmer};
pub use context::RunContext;
pub use engine::{ApplyEngine, ConfirmMode};
pub use error::{ApplyError, ApplyResult};
pub use history::{ChecksumDrift, HistoryAudit, HistorySnapshot};
pub use report::{AbortReason, ApplyReport, RevisionOutcome, RevisionState, RunState};

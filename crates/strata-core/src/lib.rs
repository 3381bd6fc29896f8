//! Strata Core Library
//!
//! Revisions, their dependency graph and layering, and the engine that
//! applies pending revisions to a target database.
//!
//! ## Key Components
//!
//! - `revision`: revision model and the YAML revision store
//! - `graph`: validated dependency DAG and layer computation
//! - `apply`: the apply state machine, confirmation capability and reports
//! - `obs` / `telemetry`: structured logging

pub mod apply;
pub mod graph;
pub mod obs;
pub mod revision;
pub mod telemetry;

pub use apply::{
    AbortReason, ApplyEngine, ApplyError, ApplyReport, AutoApprove, ConfirmMode,
    ConfirmationRequest, Confirmer, Decision, RevisionState, RunContext, RunState,
    ScriptedConfirmer,
};
pub use graph::{compute_layers, revision_layers, GraphError, Layer, RevisionGraph};
pub use revision::{
    scaffold_revision, Checksum, Revision, RevisionDefinition, RevisionError, RevisionStore,
};

pub use obs::RunSpan;
pub use telemetry::init_tracing;

/// Strata version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

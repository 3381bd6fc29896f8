//! Error types for apply runs.
//!
//! Only failures that prevent a run from starting are errors. Outcomes of a
//! started run (decline, script failure, lost connection) are reported in the
//! [`ApplyReport`](crate::apply::ApplyReport) instead.

use strata_state::StateError;
use thiserror::Error;

use crate::graph::GraphError;

/// Errors that stop an apply run before any revision is attempted.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The revision set does not form a valid graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The tracking table says `revision` is applied but one of its
    /// dependencies is not.
    #[error(
        "inconsistent history: {revision} is recorded as applied \
         but its dependency {missing_dependency} is not"
    )]
    InconsistentHistory {
        revision: String,
        missing_dependency: String,
    },

    /// `dependency` was recorded as applied after `revision`, which depends
    /// on it.
    #[error(
        "inconsistent history: {revision} was applied at {revision_applied_at} \
         before its dependency {dependency} at {dependency_applied_at}"
    )]
    OutOfOrderHistory {
        revision: String,
        revision_applied_at: String,
        dependency: String,
        dependency_applied_at: String,
    },

    /// Reading history from the target failed.
    #[error("target error: {0}")]
    State(#[from] StateError),
}

/// Convenience result alias.
pub type ApplyResult<T> = std::result::Result<T, ApplyError>;

impl ApplyError {
    /// Structural problems found before touching the database.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ApplyError::Graph(_)
                | ApplyError::InconsistentHistory { .. }
                | ApplyError::OutOfOrderHistory { .. }
        )
    }
}

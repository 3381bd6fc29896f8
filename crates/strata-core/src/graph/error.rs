//! Error types for revision graph construction and queries.

use thiserror::Error;

/// Structural problems found while building or querying the revision graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two active revisions share an identifier.
    #[error("duplicate revision id: {id}")]
    DuplicateRevisionId { id: String },

    /// A revision lists a dependency that is not an active revision.
    #[error("revision {revision} depends on unknown revision {dependency}")]
    MissingDependency { revision: String, dependency: String },

    /// The dependency relation is not acyclic. `cycle` starts and ends with
    /// the same id.
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// A query named a revision that is not in the graph.
    #[error("revision not found in graph: {id}")]
    RevisionNotFound { id: String },
}

/// Convenience result alias.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

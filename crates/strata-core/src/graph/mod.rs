//! Revision dependency graph and its layering.
//!
//! - [`dag`]: validated DAG with dependency/dependent queries
//! - [`layers`]: generational layering for display and apply order

pub mod dag;
pub mod error;
pub mod layers;

pub use dag::RevisionGraph;
pub use error::{GraphError, GraphResult};
pub use layers::{compute_layers, layer_index, revision_layers, Layer};

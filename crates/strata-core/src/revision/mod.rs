//! Revision definitions: the model, its error type and the on-disk store.

pub mod error;
pub mod model;
pub mod store;

pub use error::{RevisionError, RevisionResult};
pub use model::{Checksum, Revision};
pub use store::{scaffold_revision, validate_revision_name, RevisionDefinition, RevisionStore};

//! Error types for loading and scaffolding revision definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading or writing revision definition files.
#[derive(Debug, Error)]
pub enum RevisionError {
    /// A definition file could not be parsed.
    #[error("malformed revision file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// An active definition has no forward script.
    #[error("revision {revision} in {path} has no sql_text; fill it in or set active: false")]
    EmptyScript { revision: String, path: PathBuf },

    /// A revision name is not usable as an identifier / file name.
    #[error("invalid revision name {name:?}: use letters, digits, '_', '-' or '.'")]
    InvalidName { name: String },

    /// Scaffolding would overwrite an existing file.
    #[error("revision file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result alias.
pub type RevisionResult<T> = std::result::Result<T, RevisionError>;

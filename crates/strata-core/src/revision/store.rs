//! Revision definitions on disk.
//!
//! Each revision is one YAML file under the revisions directory (searched
//! recursively, `*.yaml` / `*.yml`):
//!
//! ```yaml
//! revision_name: add_users
//! description: users table
//! dependencies: [init]
//! sql_text: |
//!   CREATE TABLE users (id INTEGER PRIMARY KEY);
//! reverse_sql: DROP TABLE users;
//! active: true
//! ```
//!
//! Inactive definitions are skipped at load time. Structural problems across
//! files (duplicate names, unknown dependencies) are left to the graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::error::{RevisionError, RevisionResult};
use super::model::Revision;

/// On-disk shape of a revision file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionDefinition {
    pub revision_name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub sql_text: Option<String>,
    #[serde(default)]
    pub reverse_sql: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

impl RevisionDefinition {
    /// Skeleton written by `new-revision`; `sql_text` is left for the author.
    pub fn template(name: &str, dependencies: Vec<String>, description: Option<String>) -> Self {
        Self {
            revision_name: name.to_string(),
            dependencies,
            sql_text: Some(String::new()),
            reverse_sql: None,
            active: true,
            description,
        }
    }

    fn into_revision(self, path: &Path) -> RevisionResult<Revision> {
        let forward = match self.sql_text {
            Some(sql) if !sql.trim().is_empty() => sql,
            _ => {
                return Err(RevisionError::EmptyScript {
                    revision: self.revision_name,
                    path: path.to_path_buf(),
                })
            }
        };
        let mut revision = Revision::new(self.revision_name, self.dependencies, forward);
        if let Some(description) = self.description {
            revision = revision.with_description(description);
        }
        if let Some(reverse) = self.reverse_sql.filter(|s| !s.trim().is_empty()) {
            revision = revision.with_reverse_sql(reverse);
        }
        Ok(revision)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("revision name pattern is valid")
    })
}

/// Check that `name` can serve both as a revision id and a file stem.
pub fn validate_revision_name(name: &str) -> RevisionResult<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(RevisionError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Immutable snapshot of the active revisions for one run.
#[derive(Debug, Clone, Default)]
pub struct RevisionStore {
    revisions: Vec<Revision>,
    sources: BTreeMap<String, PathBuf>,
}

impl RevisionStore {
    /// Build a store from already-parsed revisions.
    pub fn from_revisions(revisions: Vec<Revision>) -> Self {
        Self {
            revisions,
            sources: BTreeMap::new(),
        }
    }

    /// Load every active definition under `dir`, in path order.
    pub fn load_dir(dir: &Path) -> RevisionResult<Self> {
        info!(dir = %dir.display(), "loading revision definitions");
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| RevisionError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            })?;
            if entry.file_type().is_file() && is_definition_file(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        let mut store = Self::default();
        for path in paths {
            let definition = read_definition(&path)?;
            if !definition.active {
                debug!(revision = %definition.revision_name, "skipping inactive revision");
                continue;
            }
            let revision = definition.into_revision(&path)?;
            store.sources.insert(revision.id.clone(), path);
            store.revisions.push(revision);
        }
        info!(count = store.revisions.len(), "revision definitions loaded");
        Ok(store)
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn into_revisions(self) -> Vec<Revision> {
        self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// File a revision was loaded from (last one wins for duplicate names).
    pub fn source_of(&self, id: &str) -> Option<&Path> {
        self.sources.get(id).map(PathBuf::as_path)
    }
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read_definition(path: &Path) -> RevisionResult<RevisionDefinition> {
    let text = std::fs::read_to_string(path).map_err(|source| RevisionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|e| RevisionError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write a new revision skeleton to `<dir>/<name>.yaml`.
pub fn scaffold_revision(
    dir: &Path,
    name: &str,
    dependencies: Vec<String>,
    description: Option<String>,
) -> RevisionResult<PathBuf> {
    validate_revision_name(name)?;
    for dependency in &dependencies {
        validate_revision_name(dependency)?;
    }

    let path = dir.join(format!("{name}.yaml"));
    if path.exists() {
        return Err(RevisionError::AlreadyExists { path });
    }
    std::fs::create_dir_all(dir).map_err(|source| RevisionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let definition = RevisionDefinition::template(name, dependencies, description);
    let yaml = serde_yaml::to_string(&definition).map_err(|e| RevisionError::Malformed {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    std::fs::write(&path, yaml).map_err(|source| RevisionError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "revision scaffolded");
    Ok(path)
}

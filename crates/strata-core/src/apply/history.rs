//! Applied-history checks against the current revision graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strata_state::ApplicationRecord;

use crate::apply::error::{ApplyError, ApplyResult};
use crate::graph::RevisionGraph;

/// An applied revision whose definition changed after it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumDrift {
    pub revision: String,
    pub recorded: String,
    pub current: String,
}

/// Non-fatal findings about the tracking table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryAudit {
    /// Applied ids with no active definition.
    pub unknown: Vec<String>,
    pub drifted: Vec<ChecksumDrift>,
}

impl HistoryAudit {
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty() && self.drifted.is_empty()
    }
}

/// Application records read once at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    records: BTreeMap<String, ApplicationRecord>,
}

impl HistorySnapshot {
    pub fn from_records(records: impl IntoIterator<Item = ApplicationRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.revision_id.clone(), r))
                .collect(),
        }
    }

    pub fn is_applied(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn applied_set(&self) -> BTreeSet<String> {
        self.records.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&ApplicationRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every applied revision known to `graph` must have all of its
    /// dependencies applied as well, each no later than the revision itself.
    pub fn check_downward_closed(&self, graph: &RevisionGraph) -> ApplyResult<()> {
        for (id, record) in &self.records {
            if !graph.contains(id) {
                continue;
            }
            for dep in graph.edges_up(id) {
                let Some(dep_record) = self.records.get(dep) else {
                    return Err(ApplyError::InconsistentHistory {
                        revision: id.clone(),
                        missing_dependency: dep.clone(),
                    });
                };
                if dep_record.applied_at > record.applied_at {
                    return Err(ApplyError::OutOfOrderHistory {
                        revision: id.clone(),
                        revision_applied_at: record.applied_at.to_rfc3339(),
                        dependency: dep.clone(),
                        dependency_applied_at: dep_record.applied_at.to_rfc3339(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Unknown applied ids and checksum drift.
    pub fn audit(&self, graph: &RevisionGraph) -> HistoryAudit {
        let mut audit = HistoryAudit::default();
        for (id, record) in &self.records {
            match graph.get(id) {
                None => audit.unknown.push(id.clone()),
                Some(revision) if revision.checksum().as_str() != record.checksum => {
                    audit.drifted.push(ChecksumDrift {
                        revision: id.clone(),
                        recorded: record.checksum.clone(),
                        current: revision.checksum().to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        audit
    }
}

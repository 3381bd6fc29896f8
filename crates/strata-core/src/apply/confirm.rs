//! Operator confirmation capability.
//!
//! The engine never reads input itself; it asks a [`Confirmer`]. The CLI
//! provides an interactive implementation, tests use [`ScriptedConfirmer`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Operator answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Decline,
    /// Interrupted while waiting for an answer.
    Cancel,
}

/// What the operator is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmationRequest {
    /// A single pending revision (1-based `position` among `total` pending).
    Revision {
        id: String,
        description: Option<String>,
        position: usize,
        total: usize,
    },
    /// Every pending revision at once, before the first is applied.
    Plan { pending: Vec<String>, target: String },
}

impl fmt::Display for ConfirmationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationRequest::Revision {
                id,
                description,
                position,
                total,
            } => {
                write!(f, "[{position}/{total}] apply revision {id}")?;
                if let Some(description) = description {
                    write!(f, " ({description})")?;
                }
                Ok(())
            }
            ConfirmationRequest::Plan { pending, target } => write!(
                f,
                "apply {} revision(s) to {target}: {}",
                pending.len(),
                pending.join(", ")
            ),
        }
    }
}

/// Source of operator decisions.
#[async_trait::async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> Decision;
}

/// Approves everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait::async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&self, _request: &ConfirmationRequest) -> Decision {
        Decision::Approve
    }
}

/// Replays a fixed list of answers and records every request.
///
/// Once the answers run out every further request is declined.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<Decision>>,
    asked: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, in order.
    pub fn asked(&self) -> Vec<ConfirmationRequest> {
        self.asked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Revision ids asked about, in order (plan requests are left out).
    pub fn asked_revisions(&self) -> Vec<String> {
        self.asked()
            .into_iter()
            .filter_map(|request| match request {
                ConfirmationRequest::Revision { id, .. } => Some(id),
                ConfirmationRequest::Plan { .. } => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> Decision {
        self.asked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(Decision::Decline)
    }
}

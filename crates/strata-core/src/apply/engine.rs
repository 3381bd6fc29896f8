//! The apply state machine.
//!
//! [`ApplyEngine::run`] visits revisions layer by layer (ascending id within
//! a layer). Applied revisions are skipped; every other revision needs an
//! operator decision before its forward script and history row are committed
//! in one transaction. The first decline, cancel or failure stops the run;
//! revisions after it stay `Pending` in the report.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strata_state::{ScriptRun, StateError};
use tracing::debug;

use crate::apply::confirm::{ConfirmationRequest, Confirmer, Decision};
use crate::apply::context::RunContext;
use crate::apply::error::ApplyResult;
use crate::apply::history::HistorySnapshot;
use crate::apply::report::{AbortReason, ApplyReport, RevisionOutcome, RevisionState, RunState};
use crate::obs;

/// How confirmations are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmMode {
    /// One request per pending revision.
    EachRevision,
    /// One request listing every pending revision, before the first is applied.
    WholePlan,
}

/// Drives apply runs with an injected [`Confirmer`].
pub struct ApplyEngine {
    confirmer: Arc<dyn Confirmer>,
    mode: ConfirmMode,
}

impl ApplyEngine {
    pub fn new(confirmer: Arc<dyn Confirmer>, mode: ConfirmMode) -> Self {
        Self { confirmer, mode }
    }

    pub fn mode(&self) -> ConfirmMode {
        self.mode
    }

    /// Execute one run against `ctx`.
    ///
    /// Returns `Err` only when the run cannot start: unreadable history or a
    /// history that is not downward closed. Everything else, including
    /// aborts, is described by the returned report.
    pub async fn run(&self, ctx: RunContext<'_>) -> ApplyResult<ApplyReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::RunSpan::new(&run_id);
        span.instrument(self.execute(run_id, ctx)).await
    }

    async fn execute(&self, run_id: String, ctx: RunContext<'_>) -> ApplyResult<ApplyReport> {
        let started = Instant::now();
        let RunContext {
            graph,
            layers,
            target,
        } = ctx;
        let mut report = ApplyReport::new(run_id.clone(), target.describe(), self.mode);

        let snapshot = HistorySnapshot::from_records(target.applied_records()?);
        let audit = snapshot.audit(graph);
        for drift in &audit.drifted {
            obs::emit_checksum_drift(&drift.revision, &drift.recorded, &drift.current);
        }
        for unknown in &audit.unknown {
            obs::emit_unknown_applied(unknown);
        }
        snapshot.check_downward_closed(graph)?;
        report.drift = audit.drifted;
        report.unknown_applied = audit.unknown;

        report.outcomes = layers
            .iter()
            .flat_map(|layer| {
                layer.revisions.iter().map(move |id| RevisionOutcome {
                    revision: id.clone(),
                    layer: layer.index,
                    state: RevisionState::Pending,
                    detail: None,
                })
            })
            .collect();
        let pending: Vec<String> = report
            .outcomes
            .iter()
            .filter(|o| !snapshot.is_applied(&o.revision))
            .map(|o| o.revision.clone())
            .collect();

        report.state = RunState::Running;
        obs::emit_run_started(&run_id, &report.target, pending.len(), report.outcomes.len());

        if self.mode == ConfirmMode::WholePlan && !pending.is_empty() {
            let request = ConfirmationRequest::Plan {
                pending: pending.clone(),
                target: report.target.clone(),
            };
            match self.confirmer.confirm(&request).await {
                Decision::Approve => {}
                Decision::Decline => {
                    let abort = AbortReason::Declined { revision: None };
                    return Ok(finish(report, Some(abort), started));
                }
                Decision::Cancel => {
                    let abort = AbortReason::Cancelled { revision: None };
                    return Ok(finish(report, Some(abort), started));
                }
            }
        }

        let total = pending.len();
        let mut position = 0;
        for index in 0..report.outcomes.len() {
            let id = report.outcomes[index].revision.clone();

            match target.is_applied(&id) {
                Ok(true) => {
                    report.set_state(index, RevisionState::Skipped, None);
                    obs::emit_revision_skipped(&id);
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    obs::emit_revision_failed(&id, &err);
                    report.set_state(index, RevisionState::Failed, Some(err.to_string()));
                    let abort = AbortReason::TargetFailed {
                        revision: id,
                        message: err.to_string(),
                    };
                    return Ok(finish(report, Some(abort), started));
                }
            }
            let Some(revision) = graph.get(&id) else {
                continue;
            };
            position += 1;

            if self.mode == ConfirmMode::EachRevision {
                report.set_state(index, RevisionState::AwaitingConfirmation, None);
                let request = ConfirmationRequest::Revision {
                    id: id.clone(),
                    description: revision.description.clone(),
                    position,
                    total,
                };
                match self.confirmer.confirm(&request).await {
                    Decision::Approve => {}
                    decision => {
                        let cancelled = decision == Decision::Cancel;
                        obs::emit_revision_declined(&id, cancelled);
                        report.set_state(index, RevisionState::Declined, None);
                        let abort = if cancelled {
                            AbortReason::Cancelled { revision: Some(id) }
                        } else {
                            AbortReason::Declined { revision: Some(id) }
                        };
                        return Ok(finish(report, Some(abort), started));
                    }
                }
            }

            report.set_state(index, RevisionState::Applying, None);
            debug!(revision = %id, position, total, "applying revision");
            let script = ScriptRun {
                revision_id: &id,
                forward_sql: &revision.forward_sql,
                checksum: revision.checksum().as_str(),
            };
            match target.apply(&script) {
                Ok(record) => {
                    obs::emit_revision_applied(&id, &record.checksum);
                    report.set_state(index, RevisionState::Applied, None);
                }
                Err(err) => {
                    obs::emit_revision_failed(&id, &err);
                    report.set_state(index, RevisionState::Failed, Some(err.to_string()));
                    let abort = match err {
                        StateError::ScriptExecution { message, .. } => AbortReason::ScriptFailed {
                            revision: id,
                            message,
                        },
                        other => AbortReason::TargetFailed {
                            revision: id,
                            message: other.to_string(),
                        },
                    };
                    return Ok(finish(report, Some(abort), started));
                }
            }
        }

        Ok(finish(report, None, started))
    }
}

fn finish(mut report: ApplyReport, abort: Option<AbortReason>, started: Instant) -> ApplyReport {
    report.finish(abort);
    let state = match report.state {
        RunState::Completed => "completed",
        _ => "aborted",
    };
    obs::emit_run_finished(
        &report.run_id,
        state,
        report.applied_count(),
        started.elapsed().as_millis() as u64,
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::confirm::{AutoApprove, ScriptedConfirmer};
    use crate::graph::RevisionGraph;
    use crate::revision::Revision;
    use strata_state::fakes::MemoryTarget;
    use strata_state::MigrationTarget;

    fn chain() -> RevisionGraph {
        RevisionGraph::build(vec![
            Revision::new("a", Vec::<String>::new(), "A"),
            Revision::new("b", ["a"], "B"),
            Revision::new("c", ["b"], "C"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_auto_approve_applies_everything() {
        let graph = chain();
        let mut target = MemoryTarget::new();
        let engine = ApplyEngine::new(Arc::new(AutoApprove), ConfirmMode::EachRevision);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert!(report.is_completed());
        assert_eq!(report.applied(), vec!["a", "b", "c"]);
        assert_eq!(target.executed(), ["a", "b", "c"]);
        assert!(!report.run_id.is_empty());
    }

    #[tokio::test]
    async fn test_whole_plan_decline_has_no_effect() {
        let graph = chain();
        let mut target = MemoryTarget::new();
        let confirmer = Arc::new(ScriptedConfirmer::new([Decision::Decline]));
        let engine = ApplyEngine::new(confirmer.clone(), ConfirmMode::WholePlan);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert_eq!(report.state, RunState::Aborted);
        assert_eq!(report.abort, Some(AbortReason::Declined { revision: None }));
        assert!(target.executed().is_empty());
        assert_eq!(confirmer.asked().len(), 1);
        assert_eq!(report.not_attempted().len(), 3);
    }

    #[tokio::test]
    async fn test_whole_plan_asks_once_for_pending_only() {
        let graph = chain();
        let checksum = graph.get("a").unwrap().checksum().to_string();
        let mut target = MemoryTarget::new().with_record("a", &checksum);
        let confirmer = Arc::new(ScriptedConfirmer::new([Decision::Approve]));
        let engine = ApplyEngine::new(confirmer.clone(), ConfirmMode::WholePlan);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert!(report.is_completed());
        assert_eq!(
            confirmer.asked(),
            vec![ConfirmationRequest::Plan {
                pending: vec!["b".into(), "c".into()],
                target: "memory://".into()
            }]
        );
        assert_eq!(report.skipped(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cancel_is_reported_separately_from_decline() {
        let graph = chain();
        let mut target = MemoryTarget::new();
        let confirmer = Arc::new(ScriptedConfirmer::new([Decision::Approve, Decision::Cancel]));
        let engine = ApplyEngine::new(confirmer, ConfirmMode::EachRevision);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert_eq!(
            report.abort,
            Some(AbortReason::Cancelled {
                revision: Some("b".into())
            })
        );
        assert_eq!(report.state_of("b"), Some(RevisionState::Declined));
        assert_eq!(report.state_of("c"), Some(RevisionState::Pending));
        assert_eq!(target.executed(), ["a"]);
    }

    #[tokio::test]
    async fn test_connection_loss_aborts_as_target_failure() {
        let graph = chain();
        let mut target = MemoryTarget::new().fail_connection("b", "server closed the connection");
        let engine = ApplyEngine::new(Arc::new(AutoApprove), ConfirmMode::EachRevision);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert!(matches!(
            report.abort,
            Some(AbortReason::TargetFailed { ref revision, .. }) if revision == "b"
        ));
        assert_eq!(report.applied_count(), 1);
        assert!(!target.is_applied("c").unwrap());
    }

    #[tokio::test]
    async fn test_missing_history_table_reports_setup_failure() {
        let graph = chain();
        let mut target = MemoryTarget::without_history();
        let engine = ApplyEngine::new(Arc::new(AutoApprove), ConfirmMode::EachRevision);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert!(matches!(
            report.abort,
            Some(AbortReason::TargetFailed { ref revision, ref message })
                if revision == "a" && message.contains("setup")
        ));
    }

    #[tokio::test]
    async fn test_empty_graph_completes_without_asking() {
        let graph = RevisionGraph::build(Vec::new()).unwrap();
        let mut target = MemoryTarget::new();
        let confirmer = Arc::new(ScriptedConfirmer::default());
        let engine = ApplyEngine::new(confirmer.clone(), ConfirmMode::WholePlan);
        let report = engine.run(RunContext::new(&graph, &mut target)).await.unwrap();
        assert!(report.is_completed());
        assert!(confirmer.asked().is_empty());
    }
}

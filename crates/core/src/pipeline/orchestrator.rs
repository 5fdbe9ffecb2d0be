//! # Pipeline Orchestrator
//!
//! Sequences the six stages in fixed order, threads each output into the
//! context, tracks progress, and assembles the final artifact.
//!
//! ## Run control
//!
//! Every `execute` call takes a fresh run token and supersedes any run still
//! in flight. Liveness is checked at every stage boundary and whenever a
//! generation call returns; a superseded or cancelled run is dropped without
//! writing anything.

use super::context::PipelineContext;
use super::events::{PipelineEvent, PipelineEventKind};
use super::phase::PipelinePhase;
use super::progress::ProgressReporter;
use super::run::{ArtifactSummary, FinalArtifact, PipelineRun, RunControl, RunStatus, RunToken};
use super::runner::{StageResult, StageRunner};
use crate::agreement::{Agreement, ConsentGate};
use crate::config::PipelineConfig;
use crate::generation::Generator;
use crate::skills::SkillSet;
use crate::state::{keys, load_json, save_json, KeyValueStore, ProjectData};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a run produced no artifact
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Gate closed; nothing was started or written
    #[error("agreement incomplete: {0}")]
    Precondition(String),
    /// State machine invariant violated; the run ended in `Failed`
    #[error("orchestrator fault: {reason}")]
    OrchestratorFault {
        reason: String,
        run: Box<PipelineRun>,
    },
    #[error("{0} was superseded by a newer run")]
    StaleRunDiscarded(RunToken),
    #[error("{0} was cancelled")]
    Cancelled(RunToken),
}

impl PipelineError {
    /// Whether the UI should show this at all
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, PipelineError::StaleRunDiscarded(_))
    }
}

pub struct PipelineOrchestrator {
    runner: StageRunner,
    skills: SkillSet,
    store: Arc<dyn KeyValueStore>,
    reporter: Arc<ProgressReporter>,
    control: RunControl,
    pacing: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        store: Arc<dyn KeyValueStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            runner: StageRunner::new(generator, config),
            skills: SkillSet::default(),
            store,
            reporter: Arc::new(ProgressReporter::new()),
            control: RunControl::new(),
            pacing: config.pacing(),
        }
    }

    /// Share a reporter with other observers
    pub fn with_reporter(mut self, reporter: Arc<ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_skills(mut self, skills: SkillSet) -> Self {
        self.skills = skills;
        self
    }

    pub fn reporter(&self) -> Arc<ProgressReporter> {
        self.reporter.clone()
    }

    /// Token of the run still executing, if any
    pub fn current_token(&self) -> Option<RunToken> {
        self.control.in_flight()
    }

    /// Cooperatively cancel the live run; observed at its next boundary
    pub fn cancel(&self) -> Option<RunToken> {
        let token = self.control.cancel();
        if let Some(token) = token {
            tracing::info!(run = %token, "Cancellation requested");
        }
        token
    }

    /// Record of the last completed run, if any
    pub fn last_run(&self) -> anyhow::Result<Option<PipelineRun>> {
        load_json(self.store.as_ref(), keys::LAST_RUN)
    }

    pub fn last_summary(&self) -> anyhow::Result<Option<ArtifactSummary>> {
        load_json(self.store.as_ref(), keys::ARTIFACT_SUMMARY)
    }

    /// Run the pipeline for `project` under `agreement`.
    ///
    /// The gate is re-checked here; a closed gate fails before any token is
    /// issued, any event is published or anything is persisted.
    #[tracing::instrument(skip_all, fields(project = %project.name))]
    pub async fn execute(
        &self,
        project: ProjectData,
        agreement: &Agreement,
    ) -> Result<PipelineRun, PipelineError> {
        let verdict = ConsentGate::evaluate(agreement);
        if !verdict.open {
            tracing::warn!("Pipeline refused: {}", verdict.reason());
            return Err(PipelineError::Precondition(verdict.reason()));
        }

        let token = self.control.begin();
        let ctx = PipelineContext::new(project, agreement.clone());
        let result = self.drive(token, ctx).await;
        self.control.finish(token);
        result
    }

    async fn drive(
        &self,
        token: RunToken,
        mut ctx: PipelineContext,
    ) -> Result<PipelineRun, PipelineError> {
        let mut run = PipelineRun::new(token);

        tracing::info!(run = %token, "Pipeline run started");
        self.emit(&run, PipelineEventKind::RunStarted, None);

        for (index, (expected, skill)) in self.skills.ordered().into_iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            self.checkpoint(&run)?;

            if skill.kind() != expected {
                let reason = format!("skill for {} slot reports {}", expected, skill.kind());
                return Err(self.fault(run, reason));
            }
            if let Err(reason) = run.advance(expected.phase()) {
                return Err(self.fault(run, reason));
            }

            tracing::info!(run = %token, stage = %expected, "Stage started");
            self.emit(&run, PipelineEventKind::StageStarted, None);

            let started_at = Utc::now();
            let outcome = self
                .runner
                .run(skill.as_ref(), &ctx, &self.control, token)
                .await;

            let result = match StageResult::finalize(expected, outcome, started_at) {
                Ok(result) => result,
                Err(reason) => {
                    self.checkpoint(&run)?;
                    return Err(self.fault(run, format!("live stage result discarded: {}", reason)));
                }
            };

            if result.output().kind() != expected {
                let reason = format!(
                    "{} stage produced {} output",
                    expected,
                    result.output().kind()
                );
                return Err(self.fault(run, reason));
            }
            if let Err(e) = ctx.record(result.output().clone()) {
                return Err(self.fault(run, e.to_string()));
            }

            let kind = if result.used_fallback() {
                PipelineEventKind::StageDegraded
            } else {
                PipelineEventKind::StageCompleted
            };
            let data = json!({
                "attempts": result.attempts(),
                "error": result.error(),
            });
            run.stage_results.push(result);
            self.emit(&run, kind, Some(data));
        }

        self.checkpoint(&run)?;

        let Some(assembly) = ctx.assembly().cloned() else {
            return Err(self.fault(run, "assembly slot is empty".to_string()));
        };
        if let Err(reason) = run.advance(PipelinePhase::Complete) {
            return Err(self.fault(run, reason));
        }

        let artifact = FinalArtifact {
            project: ctx.project().name.clone(),
            assembly,
            agreement: ctx.agreement().clone(),
            degraded_stages: run.degraded_stages(),
            generated_at: Utc::now(),
        };
        let summary = artifact.summary(token);
        run.final_artifact = Some(artifact);

        // A run superseded after the last boundary must not overwrite the newer one's record
        if let Err(status) = self.control.settle(token, || self.persist(&summary, &run)) {
            return Err(self.discard(&run, status));
        }

        tracing::info!(
            run = %token,
            files = summary.file_count,
            degraded = summary.degraded_stages.len(),
            "Pipeline run complete"
        );
        let mut data = serde_json::to_value(&summary).unwrap_or_default();
        data["succeeded"] = json!(true);
        self.emit(&run, PipelineEventKind::RunCompleted, Some(data));

        Ok(run)
    }

    /// Stage boundary: stop here if the run is no longer live
    fn checkpoint(&self, run: &PipelineRun) -> Result<(), PipelineError> {
        match self.control.status(run.token) {
            RunStatus::Live => Ok(()),
            status => Err(self.discard(run, status)),
        }
    }

    fn discard(&self, run: &PipelineRun, status: RunStatus) -> PipelineError {
        if status == RunStatus::Cancelled {
            tracing::info!(run = %run.token, phase = ?run.phase, "Run cancelled");
            self.emit(
                run,
                PipelineEventKind::RunCancelled,
                Some(json!({ "reason": "cancelled by user" })),
            );
            PipelineError::Cancelled(run.token)
        } else {
            tracing::info!(run = %run.token, "Stale run discarded");
            PipelineError::StaleRunDiscarded(run.token)
        }
    }

    fn fault(&self, mut run: PipelineRun, reason: String) -> PipelineError {
        tracing::error!(run = %run.token, phase = ?run.phase, "Orchestrator fault: {}", reason);
        run.fail(reason.clone());
        self.emit(
            &run,
            PipelineEventKind::RunFailed,
            Some(json!({ "succeeded": false, "reason": reason })),
        );
        PipelineError::OrchestratorFault {
            reason,
            run: Box::new(run),
        }
    }

    fn persist(&self, summary: &ArtifactSummary, run: &PipelineRun) {
        if let Err(e) = save_json(self.store.as_ref(), keys::ARTIFACT_SUMMARY, summary) {
            tracing::warn!("Failed to persist artifact summary: {:#}", e);
        }
        if let Err(e) = save_json(self.store.as_ref(), keys::LAST_RUN, run) {
            tracing::warn!("Failed to persist run record: {:#}", e);
        }
    }

    fn emit(&self, run: &PipelineRun, kind: PipelineEventKind, data: Option<serde_json::Value>) {
        let mut event = PipelineEvent::new(kind, run.token, run.phase, run.progress_percent);
        if let Some(data) = data {
            event = event.with_data(data);
        }
        self.reporter.publish(event);
    }
}

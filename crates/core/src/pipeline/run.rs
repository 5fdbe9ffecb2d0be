//! # Pipeline Runs
//!
//! Run tokens, the per-attempt run record and the final artifact.

use super::phase::{PipelinePhase, StageKind};
use super::runner::StageResult;
use crate::agreement::Agreement;
use crate::skills::AssemblyOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Identity of one `execute` call; later tokens supersede earlier ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunToken(pub u64);

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Liveness of a run as seen at a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Live,
    /// A newer run has started
    Superseded,
    Cancelled,
}

/// Issues run tokens and answers whether a token is still live
#[derive(Debug, Default)]
pub struct RunControl {
    latest: AtomicU64,
    /// Highest token cancelled so far
    cancelled: AtomicU64,
    /// Highest token whose `execute` has returned
    finished: AtomicU64,
    /// Held while a run commits its result and while a new run begins
    commit: Mutex<()>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        match self.commit.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start a new run, superseding every earlier one
    pub fn begin(&self) -> RunToken {
        let _guard = self.lock();
        RunToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Option<RunToken> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(RunToken(n)),
        }
    }

    /// Whether the latest run is still executing
    pub fn in_flight(&self) -> Option<RunToken> {
        self.current()
            .filter(|t| self.finished.load(Ordering::SeqCst) < t.0)
    }

    /// Cancel the run in flight; returns its token if there was one
    pub fn cancel(&self) -> Option<RunToken> {
        let current = self.in_flight()?;
        self.cancelled.fetch_max(current.0, Ordering::SeqCst);
        Some(current)
    }

    /// Mark a run's `execute` as returned
    pub fn finish(&self, token: RunToken) {
        self.finished.fetch_max(token.0, Ordering::SeqCst);
    }

    pub fn status(&self, token: RunToken) -> RunStatus {
        if self.latest.load(Ordering::SeqCst) != token.0 {
            RunStatus::Superseded
        } else if self.cancelled.load(Ordering::SeqCst) >= token.0 {
            RunStatus::Cancelled
        } else {
            RunStatus::Live
        }
    }

    pub fn is_live(&self, token: RunToken) -> bool {
        self.status(token) == RunStatus::Live
    }

    /// Run `commit` only if `token` is live, with no new run able to begin meanwhile
    pub fn settle<T>(&self, token: RunToken, commit: impl FnOnce() -> T) -> Result<T, RunStatus> {
        let _guard = self.lock();
        match self.status(token) {
            RunStatus::Live => Ok(commit()),
            status => Err(status),
        }
    }
}

/// Terminal product of a successful run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalArtifact {
    pub project: String,
    pub assembly: AssemblyOutput,
    /// Agreement as it stood when the run started
    pub agreement: Agreement,
    /// Stages whose output is fallback content
    pub degraded_stages: Vec<StageKind>,
    pub generated_at: DateTime<Utc>,
}

impl FinalArtifact {
    pub fn summary(&self, run: RunToken) -> ArtifactSummary {
        ArtifactSummary {
            run,
            project: self.project.clone(),
            file_count: self.assembly.files.len(),
            config_count: self.assembly.config.len(),
            degraded_stages: self.degraded_stages.clone(),
            generated_at: self.generated_at,
        }
    }
}

/// What the UI shows without re-running the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactSummary {
    pub run: RunToken,
    pub project: String,
    pub file_count: usize,
    pub config_count: usize,
    pub degraded_stages: Vec<StageKind>,
    pub generated_at: DateTime<Utc>,
}

impl ArtifactSummary {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_stages.is_empty()
    }
}

/// Record of one generation attempt; never resumed, only replaced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub token: RunToken,
    pub phase: PipelinePhase,
    pub current_stage_index: usize,
    pub progress_percent: u8,
    pub stage_results: Vec<StageResult>,
    pub final_artifact: Option<FinalArtifact>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(token: RunToken) -> Self {
        Self {
            token,
            phase: PipelinePhase::Idle,
            current_stage_index: 0,
            progress_percent: 0,
            stage_results: Vec::new(),
            final_artifact: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to an adjacent phase; progress only ever goes up
    pub fn advance(&mut self, to: PipelinePhase) -> Result<(), String> {
        if !self.phase.can_transition_to(to) {
            return Err(format!(
                "illegal transition {:?} -> {:?}",
                self.phase, to
            ));
        }
        self.phase = to;
        if let Some(stage) = to.stage() {
            self.current_stage_index = stage.index();
        }
        self.progress_percent = self.progress_percent.max(to.progress_floor());
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
        if !self.phase.is_terminal() {
            self.phase = PipelinePhase::Failed;
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn degraded_stages(&self) -> Vec<StageKind> {
        self.stage_results
            .iter()
            .filter(|r| r.used_fallback())
            .map(|r| r.stage())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == PipelinePhase::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_supersedes_old() {
        let control = RunControl::new();
        assert_eq!(control.current(), None);

        let first = control.begin();
        assert!(control.is_live(first));

        let second = control.begin();
        assert!(second > first);
        assert_eq!(control.status(first), RunStatus::Superseded);
        assert_eq!(control.status(second), RunStatus::Live);
    }

    #[test]
    fn test_cancel_only_affects_current_and_older() {
        let control = RunControl::new();
        assert_eq!(control.cancel(), None);

        let first = control.begin();
        assert_eq!(control.cancel(), Some(first));
        assert_eq!(control.status(first), RunStatus::Cancelled);

        let second = control.begin();
        assert_eq!(control.status(second), RunStatus::Live);
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let control = RunControl::new();
        let token = control.begin();
        assert_eq!(control.in_flight(), Some(token));

        control.finish(token);
        assert_eq!(control.in_flight(), None);
        assert_eq!(control.cancel(), None);
        assert_eq!(control.status(token), RunStatus::Live);

        // A later run is cancellable again
        let next = control.begin();
        assert_eq!(control.cancel(), Some(next));
    }

    #[test]
    fn test_settle_commits_only_live_runs() {
        let control = RunControl::new();
        let first = control.begin();
        assert_eq!(control.settle(first, || 7), Ok(7));

        let second = control.begin();
        let mut committed = false;
        assert_eq!(
            control.settle(first, || committed = true),
            Err(RunStatus::Superseded)
        );
        assert!(!committed);

        control.cancel();
        assert_eq!(control.settle(second, || ()), Err(RunStatus::Cancelled));
    }

    #[test]
    fn test_run_advances_linearly_and_monotonically() {
        let mut run = PipelineRun::new(RunToken(1));
        assert!(run.advance(PipelinePhase::BuildingPages).is_err());
        assert_eq!(run.phase, PipelinePhase::Idle);

        let mut last = run.progress_percent;
        while let Some(next) = run.phase.next() {
            run.advance(next).unwrap();
            assert!(run.progress_percent >= last);
            last = run.progress_percent;
        }
        assert!(run.is_complete());
        assert_eq!(run.progress_percent, 100);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_fail_keeps_progress() {
        let mut run = PipelineRun::new(RunToken(1));
        run.advance(PipelinePhase::Analyzing).unwrap();
        run.advance(PipelinePhase::DesigningArchitecture).unwrap();
        run.fail("boom");
        assert_eq!(run.phase, PipelinePhase::Failed);
        assert_eq!(run.progress_percent, 10);
        assert_eq!(run.error.as_deref(), Some("boom"));
    }
}

//! # Stage Runner
//!
//! Executes one stage: build the request from the context, call the
//! generator under a timeout, check the shape, retry a bounded number of
//! times, then fall back. A stage never aborts the pipeline on its own.

use super::context::{PipelineContext, StageOutput};
use super::phase::StageKind;
use super::run::{RunControl, RunStatus, RunToken};
use crate::config::PipelineConfig;
use crate::generation::{GenerationError, Generator};
use crate::skills::StageSkill;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How a stage ended
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Generated output passed the shape check
    Ok { output: StageOutput, attempts: u32 },
    /// Every attempt failed; deterministic fallback used
    Fallback {
        output: StageOutput,
        attempts: u32,
        reason: String,
    },
    /// The run went stale or was cancelled while the call was in flight
    Err(String),
}

/// Finalized result of one stage; immutable once built
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageResult {
    stage: StageKind,
    output: StageOutput,
    succeeded: bool,
    used_fallback: bool,
    attempts: u32,
    error: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl StageResult {
    /// Seal an outcome; discarded outcomes yield their reason
    pub fn finalize(
        stage: StageKind,
        outcome: StageOutcome,
        started_at: DateTime<Utc>,
    ) -> Result<Self, String> {
        let (output, attempts, error) = match outcome {
            StageOutcome::Ok { output, attempts } => (output, attempts, None),
            StageOutcome::Fallback {
                output,
                attempts,
                reason,
            } => (output, attempts, Some(reason)),
            StageOutcome::Err(reason) => return Err(reason),
        };
        let used_fallback = error.is_some();
        Ok(Self {
            stage,
            output,
            succeeded: !used_fallback,
            used_fallback,
            attempts,
            error,
            started_at,
            finished_at: Utc::now(),
        })
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    pub fn output(&self) -> &StageOutput {
        &self.output
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Why the fallback was used
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}

/// Runs single stages against the generation port
#[derive(Clone)]
pub struct StageRunner {
    generator: Arc<dyn Generator>,
    stage_timeout: Duration,
    max_retries: u32,
}

impl StageRunner {
    pub fn new(generator: Arc<dyn Generator>, config: &PipelineConfig) -> Self {
        Self {
            generator,
            stage_timeout: config.stage_timeout(),
            max_retries: config.max_retries,
        }
    }

    pub async fn run(
        &self,
        skill: &dyn StageSkill,
        ctx: &PipelineContext,
        control: &RunControl,
        token: RunToken,
    ) -> StageOutcome {
        let stage = skill.kind();
        let request = skill.request(ctx);
        let allowed = 1 + self.max_retries;
        let mut last_error = String::new();

        for attempt in 1..=allowed {
            let result =
                match tokio::time::timeout(self.stage_timeout, self.generator.invoke(&request))
                    .await
                {
                    Ok(Ok(raw)) => skill.parse(raw),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(GenerationError::Timeout(self.stage_timeout.as_secs()).to_string()),
                };

            // The call was allowed to finish; its result is only kept for a live run
            match control.status(token) {
                RunStatus::Live => {}
                RunStatus::Superseded => {
                    return StageOutcome::Err(format!("{} superseded during {}", token, stage))
                }
                RunStatus::Cancelled => {
                    return StageOutcome::Err(format!("{} cancelled during {}", token, stage))
                }
            }

            match result {
                Ok(output) => return StageOutcome::Ok { output, attempts: attempt },
                Err(reason) => {
                    tracing::debug!(stage = %stage, attempt, "Stage attempt failed: {}", reason);
                    last_error = reason;
                }
            }
        }

        tracing::warn!(stage = %stage, attempts = allowed, "Stage degraded to fallback: {}", last_error);
        StageOutcome::Fallback {
            output: skill.fallback(ctx),
            attempts: allowed,
            reason: last_error,
        }
    }
}

//! # Pipeline Events
//!
//! UI-facing events produced by the orchestrator.

use super::phase::{PipelinePhase, StageKind};
use super::run::RunToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of pipeline event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Gate passed, run token issued
    RunStarted,
    /// Stage entered
    StageStarted,
    /// Stage finished with generated output
    StageCompleted,
    /// Stage finished with fallback output
    StageDegraded,
    /// Run reached `Complete`; data carries the artifact summary
    RunCompleted,
    /// Orchestrator fault; data carries the reason
    RunFailed,
    /// Run cancelled at a boundary
    RunCancelled,
}

impl PipelineEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEventKind::RunCompleted
                | PipelineEventKind::RunFailed
                | PipelineEventKind::RunCancelled
        )
    }
}

/// An event in a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Run that produced the event
    pub run: RunToken,
    pub phase: PipelinePhase,
    #[serde(default)]
    pub stage: Option<StageKind>,
    /// Progress at the time of the event
    pub percent: u8,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(kind: PipelineEventKind, run: RunToken, phase: PipelinePhase, percent: u8) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            run,
            phase,
            stage: phase.stage(),
            percent,
            data: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Name shown next to the progress bar
    pub fn stage_name(&self) -> &'static str {
        self.phase.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = PipelineEvent::new(
            PipelineEventKind::StageStarted,
            RunToken(3),
            PipelinePhase::BuildingPages,
            40,
        )
        .with_data(serde_json::json!({ "attempts": 1 }));

        assert_eq!(event.stage, Some(StageKind::Pages));
        assert_eq!(event.stage_name(), "Building pages");
        assert!(!event.kind.is_terminal());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "stage_started");
        assert_eq!(json["run"], 3);
    }
}

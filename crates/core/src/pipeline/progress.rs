//! # Progress Reporter
//!
//! Passive sink the orchestrator feeds after every transition. Keeps only the
//! latest snapshot, so an observer that reconnects mid-run picks up where the
//! run is. Events from a run older than the latest one seen are dropped.

use super::events::{PipelineEvent, PipelineEventKind};
use super::phase::{PipelinePhase, StageKind};
use super::run::RunToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Latest known progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub run: Option<RunToken>,
    pub phase: PipelinePhase,
    pub stage: Option<StageKind>,
    pub stage_name: String,
    pub percent: u8,
    /// Failure or cancellation reason of a terminal run
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct ProgressReporter {
    latest: Mutex<ProgressSnapshot>,
    events: broadcast::Sender<PipelineEvent>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            latest: Mutex::new(ProgressSnapshot {
                stage_name: PipelinePhase::Idle.label().to_string(),
                ..Default::default()
            }),
            events,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        match self.latest.lock() {
            Ok(latest) => latest.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Latest snapshot plus a receiver for everything after it
    pub fn subscribe(&self) -> (ProgressSnapshot, broadcast::Receiver<PipelineEvent>) {
        let rx = self.events.subscribe();
        (self.snapshot(), rx)
    }

    pub fn observers(&self) -> usize {
        self.events.receiver_count()
    }

    /// Record and fan out an event; returns false if it came from a stale run
    pub fn publish(&self, event: PipelineEvent) -> bool {
        {
            let mut latest = match self.latest.lock() {
                Ok(latest) => latest,
                Err(poisoned) => poisoned.into_inner(),
            };
            if matches!(latest.run, Some(current) if event.run < current) {
                tracing::debug!(run = %event.run, "Dropping event from stale run");
                return false;
            }

            let same_run = latest.run == Some(event.run);
            latest.percent = if same_run {
                latest.percent.max(event.percent)
            } else {
                event.percent
            };
            latest.run = Some(event.run);
            latest.phase = event.phase;
            latest.stage = event.stage;
            latest.stage_name = event.stage_name().to_string();
            latest.updated_at = Some(event.timestamp);
            latest.message = match event.kind {
                PipelineEventKind::RunFailed | PipelineEventKind::RunCancelled => event
                    .data
                    .as_ref()
                    .and_then(|d| d.get("reason"))
                    .and_then(|r| r.as_str())
                    .map(str::to_string),
                _ => None,
            };
        }

        // No observers is fine: the snapshot still holds the progress
        let _ = self.events.send(event);
        true
    }
}

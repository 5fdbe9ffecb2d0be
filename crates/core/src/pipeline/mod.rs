//! # Generation Pipeline
//!
//! Agreement-gated, strictly sequential stage chain:
//!
//! ```text
//! Idle -> Analyzing -> DesigningArchitecture -> BuildingComponents
//!      -> BuildingPages -> IntegratingModules -> Assembling -> Complete
//! ```
//!
//! A failing stage degrades to its fallback and the run carries on; only an
//! orchestrator fault ends a run in `Failed`.

pub mod context;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod run;
pub mod runner;

pub use context::{PipelineContext, SlotFilled, StageOutput};
pub use events::{PipelineEvent, PipelineEventKind};
pub use orchestrator::{PipelineError, PipelineOrchestrator};
pub use phase::{PipelinePhase, StageKind};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use run::{ArtifactSummary, FinalArtifact, PipelineRun, RunControl, RunStatus, RunToken};
pub use runner::{StageOutcome, StageResult, StageRunner};

//! # Pipeline Phases
//!
//! The fixed linear state machine of a generation run and the stages that
//! drive it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One generation stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Analysis,
    Architecture,
    Components,
    Pages,
    Integrations,
    Assembly,
}

impl StageKind {
    pub const ALL: [StageKind; 6] = [
        StageKind::Analysis,
        StageKind::Architecture,
        StageKind::Components,
        StageKind::Pages,
        StageKind::Integrations,
        StageKind::Assembly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Analysis => "analysis",
            StageKind::Architecture => "architecture",
            StageKind::Components => "components",
            StageKind::Pages => "pages",
            StageKind::Integrations => "integrations",
            StageKind::Assembly => "assembly",
        }
    }

    /// Phase the run is in while this stage executes
    pub fn phase(&self) -> PipelinePhase {
        match self {
            StageKind::Analysis => PipelinePhase::Analyzing,
            StageKind::Architecture => PipelinePhase::DesigningArchitecture,
            StageKind::Components => PipelinePhase::BuildingComponents,
            StageKind::Pages => PipelinePhase::BuildingPages,
            StageKind::Integrations => PipelinePhase::IntegratingModules,
            StageKind::Assembly => PipelinePhase::Assembling,
        }
    }

    /// Share of the progress bar; assembly aggregates everything and weighs most
    pub fn weight(&self) -> u8 {
        match self {
            StageKind::Analysis => 10,
            StageKind::Assembly => 30,
            _ => 15,
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    #[default]
    Idle,
    Analyzing,
    DesigningArchitecture,
    BuildingComponents,
    BuildingPages,
    IntegratingModules,
    Assembling,
    Complete,
    /// Only reachable through an orchestrator fault
    Failed,
}

impl PipelinePhase {
    /// Successor on the happy path
    pub fn next(&self) -> Option<PipelinePhase> {
        match self {
            PipelinePhase::Idle => Some(PipelinePhase::Analyzing),
            PipelinePhase::Analyzing => Some(PipelinePhase::DesigningArchitecture),
            PipelinePhase::DesigningArchitecture => Some(PipelinePhase::BuildingComponents),
            PipelinePhase::BuildingComponents => Some(PipelinePhase::BuildingPages),
            PipelinePhase::BuildingPages => Some(PipelinePhase::IntegratingModules),
            PipelinePhase::IntegratingModules => Some(PipelinePhase::Assembling),
            PipelinePhase::Assembling => Some(PipelinePhase::Complete),
            PipelinePhase::Complete | PipelinePhase::Failed => None,
        }
    }

    pub fn stage(&self) -> Option<StageKind> {
        StageKind::ALL.into_iter().find(|s| s.phase() == *self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Complete | PipelinePhase::Failed)
    }

    /// Adjacent forward move, or any non-terminal phase to `Failed`
    pub fn can_transition_to(&self, to: PipelinePhase) -> bool {
        if to == PipelinePhase::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    /// Progress reached on entering this phase: weights of every stage before it
    pub fn progress_floor(&self) -> u8 {
        match self {
            PipelinePhase::Idle | PipelinePhase::Failed => 0,
            PipelinePhase::Complete => 100,
            phase => match phase.stage() {
                Some(stage) => StageKind::ALL[..stage.index()]
                    .iter()
                    .map(|s| s.weight())
                    .sum(),
                None => 0,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "Idle",
            PipelinePhase::Analyzing => "Analyzing context",
            PipelinePhase::DesigningArchitecture => "Designing architecture",
            PipelinePhase::BuildingComponents => "Building components",
            PipelinePhase::BuildingPages => "Building pages",
            PipelinePhase::IntegratingModules => "Integrating modules",
            PipelinePhase::Assembling => "Assembling application",
            PipelinePhase::Complete => "Complete",
            PipelinePhase::Failed => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_hundred() {
        let total: u32 = StageKind::ALL.iter().map(|s| s.weight() as u32).sum();
        assert_eq!(total, 100);
        assert!(StageKind::Assembly.weight() > StageKind::Analysis.weight());
    }

    #[test]
    fn test_linear_order() {
        let mut phase = PipelinePhase::Idle;
        let mut visited = Vec::new();
        while let Some(next) = phase.next() {
            assert!(phase.can_transition_to(next));
            phase = next;
            if let Some(stage) = phase.stage() {
                visited.push(stage);
            }
        }
        assert_eq!(phase, PipelinePhase::Complete);
        assert_eq!(visited, StageKind::ALL.to_vec());
    }

    #[test]
    fn test_non_adjacent_transition_rejected() {
        assert!(!PipelinePhase::Analyzing.can_transition_to(PipelinePhase::BuildingPages));
        assert!(!PipelinePhase::Idle.can_transition_to(PipelinePhase::Complete));
        assert!(!PipelinePhase::Complete.can_transition_to(PipelinePhase::Failed));
        assert!(PipelinePhase::BuildingPages.can_transition_to(PipelinePhase::Failed));
    }

    #[test]
    fn test_progress_floor_is_monotonic() {
        let mut phase = PipelinePhase::Idle;
        let mut last = phase.progress_floor();
        while let Some(next) = phase.next() {
            let floor = next.progress_floor();
            assert!(floor >= last);
            if next != PipelinePhase::Complete {
                assert!(floor < 100);
            }
            last = floor;
            phase = next;
        }
        assert_eq!(last, 100);
        assert_eq!(PipelinePhase::Assembling.progress_floor(), 70);
    }
}

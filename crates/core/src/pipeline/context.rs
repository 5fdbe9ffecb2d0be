//! # Pipeline Context
//!
//! The accumulating record a run threads through its stages. Each stage
//! owns exactly one slot; slots are written once and never touched again.

use super::phase::StageKind;
use crate::agreement::Agreement;
use crate::skills::{
    AssemblyOutput, ArchitecturePlan, ComponentLibrary, ContextAnalysis, IntegrationPlan, PageSet,
};
use crate::state::ProjectData;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output of one stage, tagged by stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "stage", content = "output", rename_all = "snake_case")]
pub enum StageOutput {
    Analysis(ContextAnalysis),
    Architecture(ArchitecturePlan),
    Components(ComponentLibrary),
    Pages(PageSet),
    Integrations(IntegrationPlan),
    Assembly(AssemblyOutput),
}

impl StageOutput {
    pub fn kind(&self) -> StageKind {
        match self {
            StageOutput::Analysis(_) => StageKind::Analysis,
            StageOutput::Architecture(_) => StageKind::Architecture,
            StageOutput::Components(_) => StageKind::Components,
            StageOutput::Pages(_) => StageKind::Pages,
            StageOutput::Integrations(_) => StageKind::Integrations,
            StageOutput::Assembly(_) => StageKind::Assembly,
        }
    }
}

/// Attempted write to a slot that is already filled
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("context slot '{0}' is already filled")]
pub struct SlotFilled(pub StageKind);

/// Inputs plus every finalized stage output so far
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    project: ProjectData,
    /// Read-only snapshot taken when the run started
    agreement: Agreement,
    analysis: Option<ContextAnalysis>,
    architecture: Option<ArchitecturePlan>,
    components: Option<ComponentLibrary>,
    pages: Option<PageSet>,
    integrations: Option<IntegrationPlan>,
    assembly: Option<AssemblyOutput>,
}

impl PipelineContext {
    pub fn new(project: ProjectData, agreement: Agreement) -> Self {
        Self {
            project,
            agreement,
            analysis: None,
            architecture: None,
            components: None,
            pages: None,
            integrations: None,
            assembly: None,
        }
    }

    pub fn project(&self) -> &ProjectData {
        &self.project
    }

    pub fn agreement(&self) -> &Agreement {
        &self.agreement
    }

    pub fn analysis(&self) -> Option<&ContextAnalysis> {
        self.analysis.as_ref()
    }

    pub fn architecture(&self) -> Option<&ArchitecturePlan> {
        self.architecture.as_ref()
    }

    pub fn components(&self) -> Option<&ComponentLibrary> {
        self.components.as_ref()
    }

    pub fn pages(&self) -> Option<&PageSet> {
        self.pages.as_ref()
    }

    pub fn integrations(&self) -> Option<&IntegrationPlan> {
        self.integrations.as_ref()
    }

    pub fn assembly(&self) -> Option<&AssemblyOutput> {
        self.assembly.as_ref()
    }

    /// Append a stage output into its own slot
    pub fn record(&mut self, output: StageOutput) -> Result<(), SlotFilled> {
        fn fill<T>(slot: &mut Option<T>, value: T, kind: StageKind) -> Result<(), SlotFilled> {
            if slot.is_some() {
                return Err(SlotFilled(kind));
            }
            *slot = Some(value);
            Ok(())
        }

        let kind = output.kind();
        match output {
            StageOutput::Analysis(v) => fill(&mut self.analysis, v, kind),
            StageOutput::Architecture(v) => fill(&mut self.architecture, v, kind),
            StageOutput::Components(v) => fill(&mut self.components, v, kind),
            StageOutput::Pages(v) => fill(&mut self.pages, v, kind),
            StageOutput::Integrations(v) => fill(&mut self.integrations, v, kind),
            StageOutput::Assembly(v) => fill(&mut self.assembly, v, kind),
        }
    }

    pub fn is_filled(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::Analysis => self.analysis.is_some(),
            StageKind::Architecture => self.architecture.is_some(),
            StageKind::Components => self.components.is_some(),
            StageKind::Pages => self.pages.is_some(),
            StageKind::Integrations => self.integrations.is_some(),
            StageKind::Assembly => self.assembly.is_some(),
        }
    }

    /// Stages whose slot is filled, in pipeline order
    pub fn filled(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|k| self.is_filled(*k))
            .collect()
    }

    /// Upstream outputs as pretty JSON for prompt building
    pub fn upstream_json(&self) -> String {
        let upstream = serde_json::json!({
            "analysis": self.analysis,
            "architecture": self.architecture,
            "components": self.components,
            "pages": self.pages,
            "integrations": self.integrations,
        });
        serde_json::to_string_pretty(&upstream).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::ContextAnalysis;

    fn analysis() -> ContextAnalysis {
        ContextAnalysis {
            summary: "A booking app".to_string(),
            target_users: vec!["salons".to_string()],
            core_features: vec!["Booking".to_string()],
            constraints: vec![],
            complexity: "moderate".to_string(),
        }
    }

    #[test]
    fn test_slot_written_once() {
        let mut ctx = PipelineContext::new(ProjectData::default(), Agreement::default());
        assert!(ctx.filled().is_empty());

        ctx.record(StageOutput::Analysis(analysis())).unwrap();
        assert_eq!(ctx.filled(), vec![StageKind::Analysis]);
        assert_eq!(ctx.analysis().unwrap().summary, "A booking app");

        let err = ctx.record(StageOutput::Analysis(analysis())).unwrap_err();
        assert_eq!(err, SlotFilled(StageKind::Analysis));
    }

    #[test]
    fn test_output_serializes_tagged() {
        let value = serde_json::to_value(StageOutput::Analysis(analysis())).unwrap();
        assert_eq!(value["stage"], "analysis");
        assert_eq!(value["output"]["complexity"], "moderate");
    }
}

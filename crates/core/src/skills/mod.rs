//! # Studio Skills
//!
//! One skill per pipeline stage. A skill knows how to phrase its request from
//! the accumulated context, how to check what comes back, and what to use
//! when nothing usable comes back.
//!
//! ## Stages
//!
//! ```text
//! analysis -> architecture -> components -> pages -> integrations -> assembly
//! ```
//!
//! Mockups (`MockupSkill`) sit beside the pipeline and use the image port.

pub mod prompts;

pub mod analysis_skill;
pub mod architecture_skill;
pub mod assembly_skill;
pub mod component_skill;
pub mod integration_skill;
pub mod page_skill;

pub mod mockup_skill;

pub use analysis_skill::{AnalysisSkill, ContextAnalysis};
pub use architecture_skill::{ArchitecturePlan, ArchitectureSkill, EntitySketch};
pub use assembly_skill::{AssemblyOutput, AssemblySkill, ConfigEntry, GeneratedFile};
pub use component_skill::{ComponentLibrary, ComponentSkill, ComponentSpec};
pub use integration_skill::{IntegrationPlan, IntegrationSkill, IntegrationSpec};
pub use mockup_skill::{Mockup, MockupSkill};
pub use page_skill::{PageSet, PageSkill, PageSpec};

use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use crate::state::ProjectData;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A pipeline stage's generation logic
///
/// Requests are built from the context alone. `parse` receives the raw,
/// untrusted generation output and either returns a conforming output or the
/// reason it does not conform. `fallback` must always be well-formed.
pub trait StageSkill: Send + Sync {
    fn kind(&self) -> StageKind;

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest;

    fn parse(&self, raw: Value) -> Result<StageOutput, String>;

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput;
}

/// The six stage skills in pipeline order
#[derive(Clone)]
pub struct SkillSet {
    pub analysis: Arc<dyn StageSkill>,
    pub architecture: Arc<dyn StageSkill>,
    pub components: Arc<dyn StageSkill>,
    pub pages: Arc<dyn StageSkill>,
    pub integrations: Arc<dyn StageSkill>,
    pub assembly: Arc<dyn StageSkill>,
}

impl Default for SkillSet {
    fn default() -> Self {
        Self {
            analysis: Arc::new(AnalysisSkill),
            architecture: Arc::new(ArchitectureSkill),
            components: Arc::new(ComponentSkill),
            pages: Arc::new(PageSkill),
            integrations: Arc::new(IntegrationSkill),
            assembly: Arc::new(AssemblySkill),
        }
    }
}

impl SkillSet {
    /// Skill slots paired with the stage each one is expected to serve
    pub fn ordered(&self) -> [(StageKind, &Arc<dyn StageSkill>); 6] {
        [
            (StageKind::Analysis, &self.analysis),
            (StageKind::Architecture, &self.architecture),
            (StageKind::Components, &self.components),
            (StageKind::Pages, &self.pages),
            (StageKind::Integrations, &self.integrations),
            (StageKind::Assembly, &self.assembly),
        ]
    }
}

/// JSON schema of a stage output type
pub(crate) fn schema_value<T: JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}

/// Decode raw generation output into a stage output type
pub(crate) fn decode<T: DeserializeOwned>(raw: Value) -> Result<T, String> {
    if raw.is_string() {
        return Err("expected structured output, got free text".to_string());
    }
    serde_json::from_value(raw).map_err(|e| format!("output does not match shape: {}", e))
}

pub(crate) fn ensure(condition: bool, reason: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason.to_string())
    }
}

/// "pet booking" -> "PetBooking"
pub(crate) fn pascal_case(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Short project brief shared by the stage prompts
pub(crate) fn project_brief(project: &ProjectData) -> String {
    let mut brief = format!("Project: {}\n{}\n", project.name, project.description);
    if let Some(audience) = &project.target_audience {
        brief.push_str(&format!("Audience: {}\n", audience));
    }
    if !project.features.is_empty() {
        brief.push_str("\nFeatures:\n");
        for feature in &project.features {
            brief.push_str(&format!(
                "- {} ({:?}): {}\n",
                feature.name, feature.priority, feature.description
            ));
        }
    }
    if let Some(stack) = &project.tech_preferences.stack {
        brief.push_str(&format!("\nPreferred stack: {}\n", stack));
    }
    brief
}

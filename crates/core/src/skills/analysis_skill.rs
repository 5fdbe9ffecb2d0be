//! # Analysis Skill
//!
//! First stage: distills the project data and founder conversation into a
//! context analysis every later stage builds on.

use super::{decode, ensure, project_brief, prompts, schema_value, StageSkill};
use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const COMPLEXITY_LEVELS: [&str; 3] = ["simple", "moderate", "complex"];

/// Output of the analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContextAnalysis {
    /// What the product is, in developer terms
    pub summary: String,
    /// Who uses it
    pub target_users: Vec<String>,
    /// Features required at launch
    pub core_features: Vec<String>,
    /// Hard constraints (compliance, payments, data handling)
    #[serde(default)]
    pub constraints: Vec<String>,
    /// "simple", "moderate" or "complex"
    pub complexity: String,
}

pub struct AnalysisSkill;

impl StageSkill for AnalysisSkill {
    fn kind(&self) -> StageKind {
        StageKind::Analysis
    }

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest {
        let project = ctx.project();
        let mut prompt = project_brief(project);

        if !project.conversation.is_empty() {
            prompt.push_str("\nFounder conversation:\n");
            for message in &project.conversation {
                prompt.push_str(&format!("> {}\n", message));
            }
        }

        GenerationRequest::new(prompts::ANALYSIS, prompt)
            .with_schema("ContextAnalysis", schema_value::<ContextAnalysis>())
    }

    fn parse(&self, raw: Value) -> Result<StageOutput, String> {
        let analysis: ContextAnalysis = decode(raw)?;
        ensure(!analysis.summary.trim().is_empty(), "summary is empty")?;
        ensure(
            COMPLEXITY_LEVELS.contains(&analysis.complexity.as_str()),
            "complexity must be simple, moderate or complex",
        )?;
        Ok(StageOutput::Analysis(analysis))
    }

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput {
        let project = ctx.project();

        let summary = match (project.name.trim(), project.description.trim()) {
            ("", "") => "Untitled project".to_string(),
            (name, "") => name.to_string(),
            ("", description) => description.to_string(),
            (name, description) => format!("{}: {}", name, description),
        };

        let mut constraints = Vec::new();
        if let Some(policy) = &project.data_policy {
            constraints.extend(policy.compliance.iter().map(|c| format!("Compliance: {}", c)));
        }
        if project.handles_personal_data() {
            constraints.push("Stores personal data".to_string());
        }
        if let Some(model) = &project.business_model {
            if model.monetization.takes_payments() {
                constraints.push("Takes payments".to_string());
            }
        }

        let launch = project.launch_features().count();
        let complexity = match launch {
            0..=3 => "simple",
            4..=8 => "moderate",
            _ => "complex",
        };

        StageOutput::Analysis(ContextAnalysis {
            summary,
            target_users: project.target_audience.iter().cloned().collect(),
            core_features: project.launch_features().map(|f| f.name.clone()).collect(),
            constraints,
            complexity: complexity.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DataPolicy, FeaturePriority, FeatureSpec, ProjectData};
    use serde_json::json;

    fn ctx() -> PipelineContext {
        let project = ProjectData {
            name: "PetPal".to_string(),
            description: "Book trusted pet sitters".to_string(),
            target_audience: Some("Pet owners".to_string()),
            features: vec![
                FeatureSpec {
                    name: "Booking".to_string(),
                    priority: FeaturePriority::MustHave,
                    handles_user_data: true,
                    ..Default::default()
                },
                FeatureSpec {
                    name: "Badges".to_string(),
                    priority: FeaturePriority::NiceToHave,
                    ..Default::default()
                },
            ],
            data_policy: Some(DataPolicy {
                compliance: vec!["gdpr".to_string()],
                ..Default::default()
            }),
            conversation: vec!["I want it to feel safe".to_string()],
            ..Default::default()
        };
        PipelineContext::new(project, Default::default())
    }

    #[test]
    fn test_request_includes_conversation_and_schema() {
        let request = AnalysisSkill.request(&ctx());
        assert!(request.prompt.contains("PetPal"));
        assert!(request.prompt.contains("> I want it to feel safe"));
        assert_eq!(request.schema_name, "ContextAnalysis");
        assert!(request.schema.is_some());
    }

    #[test]
    fn test_parse_accepts_conforming_output() {
        let raw = json!({
            "summary": "Marketplace for pet sitting",
            "target_users": ["owners", "sitters"],
            "core_features": ["Booking"],
            "complexity": "moderate"
        });
        let output = AnalysisSkill.parse(raw).unwrap();
        assert_eq!(output.kind(), StageKind::Analysis);
    }

    #[test]
    fn test_parse_rejects_bad_shape_and_values() {
        assert!(AnalysisSkill.parse(json!({ "summary": "x" })).is_err());
        let bad_complexity = json!({
            "summary": "x",
            "target_users": [],
            "core_features": [],
            "complexity": "huge"
        });
        assert!(AnalysisSkill.parse(bad_complexity).is_err());
    }

    #[test]
    fn test_fallback_uses_launch_features_only() {
        let StageOutput::Analysis(analysis) = AnalysisSkill.fallback(&ctx()) else {
            panic!("wrong stage output");
        };
        assert_eq!(analysis.summary, "PetPal: Book trusted pet sitters");
        assert_eq!(analysis.core_features, vec!["Booking".to_string()]);
        assert_eq!(analysis.target_users, vec!["Pet owners".to_string()]);
        assert!(analysis.constraints.contains(&"Compliance: gdpr".to_string()));
        assert!(analysis.constraints.contains(&"Stores personal data".to_string()));
        assert_eq!(analysis.complexity, "simple");
    }
}

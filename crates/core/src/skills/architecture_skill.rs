//! # Architecture Skill
//!
//! Second stage: binding stack, hosting and data model decisions.

use super::{decode, ensure, pascal_case, project_brief, prompts, schema_value, StageSkill};
use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

const DEFAULT_FRONTEND: &str = "React + TypeScript";
const DEFAULT_BACKEND: &str = "Node.js (Express)";
const DEFAULT_DATABASE: &str = "PostgreSQL";
const DEFAULT_HOSTING: &str = "Vercel";

/// A data model entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntitySketch {
    /// PascalCase entity name
    pub name: String,
    /// Key fields, snake_case
    pub fields: Vec<String>,
}

/// Output of the architecture stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArchitecturePlan {
    pub frontend: String,
    pub backend: String,
    pub database: String,
    pub hosting: String,
    pub entities: Vec<EntitySketch>,
    /// Auth, data storage and constraint notes
    #[serde(default)]
    pub notes: Vec<String>,
}

pub struct ArchitectureSkill;

impl StageSkill for ArchitectureSkill {
    fn kind(&self) -> StageKind {
        StageKind::Architecture
    }

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest {
        let mut prompt = project_brief(ctx.project());
        if let Some(hosting) = &ctx.project().tech_preferences.hosting {
            prompt.push_str(&format!("Preferred hosting: {}\n", hosting));
        }
        prompt.push_str(&format!("\nPrior stages:\n{}", ctx.upstream_json()));

        GenerationRequest::new(prompts::ARCHITECTURE, prompt)
            .with_schema("ArchitecturePlan", schema_value::<ArchitecturePlan>())
    }

    fn parse(&self, raw: Value) -> Result<StageOutput, String> {
        let plan: ArchitecturePlan = decode(raw)?;
        for (field, value) in [
            ("frontend", &plan.frontend),
            ("backend", &plan.backend),
            ("database", &plan.database),
        ] {
            ensure(!value.trim().is_empty(), &format!("{} is empty", field))?;
        }

        let mut seen = HashSet::new();
        for entity in &plan.entities {
            ensure(!entity.name.trim().is_empty(), "entity without a name")?;
            ensure(
                seen.insert(entity.name.as_str()),
                &format!("duplicate entity '{}'", entity.name),
            )?;
        }
        Ok(StageOutput::Architecture(plan))
    }

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput {
        let project = ctx.project();
        let prefs = &project.tech_preferences;

        let mut entities = Vec::new();
        let needs_accounts =
            project.features.iter().any(|f| f.requires_auth) || project.handles_personal_data();
        if needs_accounts {
            entities.push(EntitySketch {
                name: "User".to_string(),
                fields: vec!["id".into(), "email".into(), "created_at".into()],
            });
        }
        for feature in project.launch_features() {
            let name = pascal_case(&feature.name);
            if name.is_empty() || entities.iter().any(|e| e.name == name) {
                continue;
            }
            entities.push(EntitySketch {
                name,
                fields: vec!["id".into(), "created_at".into(), "updated_at".into()],
            });
        }

        let mut notes = Vec::new();
        if needs_accounts {
            notes.push("Email + password authentication with hashed credentials".to_string());
        }
        if project.handles_personal_data() {
            notes.push("Personal data encrypted at rest".to_string());
        }

        StageOutput::Architecture(ArchitecturePlan {
            frontend: prefs
                .stack
                .clone()
                .unwrap_or_else(|| DEFAULT_FRONTEND.to_string()),
            backend: DEFAULT_BACKEND.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            hosting: prefs
                .hosting
                .clone()
                .unwrap_or_else(|| DEFAULT_HOSTING.to_string()),
            entities,
            notes,
        })
    }
}

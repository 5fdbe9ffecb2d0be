//! # Component Skill
//!
//! Third stage: the reusable UI component library.

use super::{decode, ensure, pascal_case, prompts, schema_value, StageSkill};
use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Layout primitives every generated app gets
const BASE_COMPONENTS: [(&str, &str, &[&str]); 5] = [
    ("AppShell", "Page frame with header and content area", &["children"]),
    ("NavBar", "Primary navigation between pages", &["links"]),
    ("Button", "Clickable action", &["label", "onClick", "variant"]),
    ("FormField", "Labelled input with validation message", &["label", "value", "error"]),
    ("Card", "Bordered content container", &["title", "children"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComponentSpec {
    /// PascalCase, unique within the library
    pub name: String,
    pub purpose: String,
    #[serde(default)]
    pub props: Vec<String>,
}

/// Output of the components stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComponentLibrary {
    pub components: Vec<ComponentSpec>,
}

impl ComponentLibrary {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.name.as_str())
    }
}

pub struct ComponentSkill;

impl StageSkill for ComponentSkill {
    fn kind(&self) -> StageKind {
        StageKind::Components
    }

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest {
        let prompt = format!(
            "Project: {}\n\nPrior stages:\n{}",
            ctx.project().name,
            ctx.upstream_json()
        );
        GenerationRequest::new(prompts::COMPONENTS, prompt)
            .with_schema("ComponentLibrary", schema_value::<ComponentLibrary>())
    }

    fn parse(&self, raw: Value) -> Result<StageOutput, String> {
        let library: ComponentLibrary = decode(raw)?;
        ensure(!library.components.is_empty(), "component library is empty")?;

        let mut seen = HashSet::new();
        for component in &library.components {
            ensure(!component.name.trim().is_empty(), "component without a name")?;
            ensure(
                seen.insert(component.name.as_str()),
                &format!("duplicate component '{}'", component.name),
            )?;
        }
        Ok(StageOutput::Components(library))
    }

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput {
        let mut components: Vec<ComponentSpec> = BASE_COMPONENTS
            .iter()
            .map(|(name, purpose, props)| ComponentSpec {
                name: name.to_string(),
                purpose: purpose.to_string(),
                props: props.iter().map(|p| p.to_string()).collect(),
            })
            .collect();

        let features: Vec<String> = match ctx.analysis() {
            Some(analysis) => analysis.core_features.clone(),
            None => ctx.project().launch_features().map(|f| f.name.clone()).collect(),
        };

        for feature in features {
            let name = format!("{}Panel", pascal_case(&feature));
            if name == "Panel" || components.iter().any(|c| c.name == name) {
                continue;
            }
            components.push(ComponentSpec {
                name,
                purpose: format!("Main interface for {}", feature),
                props: vec!["data".to_string()],
            });
        }

        StageOutput::Components(ComponentLibrary { components })
    }
}

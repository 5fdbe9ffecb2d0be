//! # Assembly Skill
//!
//! Final stage: consumes every prior slot plus the agreement snapshot and
//! produces the application manifest (files, configuration, setup steps).
//! File contents stay with the generation provider; the manifest describes them.

use super::{decode, ensure, pascal_case, prompts, schema_value, StageSkill};
use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use crate::state::slugify;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedFile {
    /// Relative path with forward slashes
    pub path: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigEntry {
    pub key: String,
    /// Placeholder value, never a real secret
    pub value: String,
}

/// Output of the assembly stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssemblyOutput {
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub config: Vec<ConfigEntry>,
    #[serde(default)]
    pub setup_steps: Vec<String>,
    pub readme: String,
}

pub struct AssemblySkill;

fn file(path: impl Into<String>, purpose: impl Into<String>) -> GeneratedFile {
    GeneratedFile {
        path: path.into(),
        purpose: purpose.into(),
    }
}

impl StageSkill for AssemblySkill {
    fn kind(&self) -> StageKind {
        StageKind::Assembly
    }

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest {
        let agreement = serde_json::to_string_pretty(ctx.agreement()).unwrap_or_default();
        let prompt = format!(
            "Project: {}\n{}\n\nAgreement:\n{}\n\nPrior stages:\n{}",
            ctx.project().name,
            ctx.project().description,
            agreement,
            ctx.upstream_json()
        );
        GenerationRequest::new(prompts::ASSEMBLY, prompt)
            .with_schema("AssemblyOutput", schema_value::<AssemblyOutput>())
    }

    fn parse(&self, raw: Value) -> Result<StageOutput, String> {
        let output: AssemblyOutput = decode(raw)?;
        ensure(!output.files.is_empty(), "no files in manifest")?;

        let mut paths = HashSet::new();
        for f in &output.files {
            ensure(!f.path.trim().is_empty(), "file without a path")?;
            ensure(
                !f.path.starts_with('/') && !f.path.split('/').any(|part| part == ".."),
                &format!("path '{}' must be relative", f.path),
            )?;
            ensure(
                paths.insert(f.path.as_str()),
                &format!("duplicate path '{}'", f.path),
            )?;
        }
        for entry in &output.config {
            ensure(!entry.key.trim().is_empty(), "config entry without a key")?;
        }
        Ok(StageOutput::Assembly(output))
    }

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput {
        let mut files = vec![
            file("package.json", "Dependencies and scripts"),
            file("src/main.tsx", "Application entry point"),
            file("src/App.tsx", "Router and page registry"),
        ];
        let mut config = vec![ConfigEntry {
            key: "DATABASE_URL".to_string(),
            value: "postgres://localhost:5432/app".to_string(),
        }];

        if let Some(pages) = ctx.pages() {
            for page in &pages.pages {
                let name = match pascal_case(&page.title) {
                    n if n.is_empty() => pascal_case(&page.route),
                    n => n,
                };
                let name = if name.is_empty() { "Home".to_string() } else { name };
                files.push(file(
                    format!("src/pages/{}Page.tsx", name),
                    format!("{} ({})", page.purpose, page.route),
                ));
            }
        }
        if let Some(components) = ctx.components() {
            for component in &components.components {
                files.push(file(
                    format!("src/components/{}.tsx", pascal_case(&component.name)),
                    component.purpose.clone(),
                ));
            }
        }
        if let Some(plan) = ctx.integrations() {
            for integration in &plan.integrations {
                files.push(file(
                    format!("src/integrations/{}.ts", slugify(&integration.service)),
                    integration.purpose.clone(),
                ));
                config.extend(integration.env_vars.iter().map(|var| ConfigEntry {
                    key: var.clone(),
                    value: "changeme".to_string(),
                }));
            }
        }
        files.push(file(".env.example", "Configuration placeholders"));
        files.push(file("README.md", "Project overview and setup"));

        let mut seen = HashSet::new();
        files.retain(|f| seen.insert(f.path.clone()));
        let mut keys = HashSet::new();
        config.retain(|c| keys.insert(c.key.clone()));

        let summary = ctx
            .analysis()
            .map(|a| a.summary.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("{} (generated application)", ctx.project().name));

        StageOutput::Assembly(AssemblyOutput {
            files,
            config,
            setup_steps: vec![
                "npm install".to_string(),
                "cp .env.example .env".to_string(),
                "npm run dev".to_string(),
            ],
            readme: summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::{Agreement, ChecklistItem, ItemCategory};
    use crate::skills::{IntegrationPlan, IntegrationSpec, PageSet, PageSpec};
    use crate::state::ProjectData;
    use serde_json::json;

    #[test]
    fn test_request_includes_agreement_snapshot() {
        let agreement = Agreement::new(
            vec![ChecklistItem::new("core-scope", ItemCategory::Scope, "d", "e")],
            vec![],
            vec![],
        );
        let ctx = PipelineContext::new(ProjectData::default(), agreement);
        let request = AssemblySkill.request(&ctx);
        assert!(request.prompt.contains("core-scope"));
        assert_eq!(request.schema_name, "AssemblyOutput");
    }

    #[test]
    fn test_fallback_covers_every_slot() {
        let mut ctx = PipelineContext::new(ProjectData::default(), Agreement::default());
        ctx.record(StageOutput::Pages(PageSet {
            pages: vec![PageSpec {
                route: "/bookings".to_string(),
                title: "My bookings".to_string(),
                purpose: "List bookings".to_string(),
                components: vec![],
            }],
        }))
        .unwrap();
        ctx.record(StageOutput::Integrations(IntegrationPlan {
            integrations: vec![IntegrationSpec {
                service: "Stripe".to_string(),
                purpose: "Payments".to_string(),
                env_vars: vec!["STRIPE_API_KEY".to_string()],
                modules: vec![],
            }],
        }))
        .unwrap();

        let StageOutput::Assembly(output) = AssemblySkill.fallback(&ctx) else {
            panic!("wrong stage output");
        };
        let paths: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"src/pages/MyBookingsPage.tsx"));
        assert!(paths.contains(&"src/integrations/stripe.ts"));
        assert!(output.config.iter().any(|c| c.key == "STRIPE_API_KEY"));
        assert!(!output.readme.is_empty());
    }

    #[test]
    fn test_parse_rejects_escaping_paths() {
        let raw = json!({
            "files": [{ "path": "../etc/passwd", "purpose": "nope" }],
            "readme": "r"
        });
        assert!(AssemblySkill.parse(raw).unwrap_err().contains("relative"));

        let absolute = json!({ "files": [{ "path": "/src/a.ts", "purpose": "p" }], "readme": "r" });
        assert!(AssemblySkill.parse(absolute).is_err());
    }
}

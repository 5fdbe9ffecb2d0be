//! # Page Skill
//!
//! Fourth stage: routes and the components each page composes.

use super::{decode, ensure, prompts, schema_value, StageSkill};
use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use crate::state::slugify;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageSpec {
    /// Absolute route, e.g. "/bookings"
    pub route: String,
    pub title: String,
    pub purpose: String,
    /// Component names from the library
    #[serde(default)]
    pub components: Vec<String>,
}

/// Output of the pages stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageSet {
    pub pages: Vec<PageSpec>,
}

pub struct PageSkill;

impl StageSkill for PageSkill {
    fn kind(&self) -> StageKind {
        StageKind::Pages
    }

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest {
        let needs_auth = ctx.project().features.iter().any(|f| f.requires_auth);
        let prompt = format!(
            "Project: {}\nAuthentication required: {}\n\nPrior stages:\n{}",
            ctx.project().name,
            needs_auth,
            ctx.upstream_json()
        );
        GenerationRequest::new(prompts::PAGES, prompt)
            .with_schema("PageSet", schema_value::<PageSet>())
    }

    fn parse(&self, raw: Value) -> Result<StageOutput, String> {
        let set: PageSet = decode(raw)?;
        ensure(!set.pages.is_empty(), "no pages")?;

        let mut routes = HashSet::new();
        for page in &set.pages {
            ensure(
                page.route.starts_with('/'),
                &format!("route '{}' must start with '/'", page.route),
            )?;
            ensure(
                routes.insert(page.route.as_str()),
                &format!("duplicate route '{}'", page.route),
            )?;
        }
        Ok(StageOutput::Pages(set))
    }

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput {
        let shell = vec!["AppShell".to_string(), "NavBar".to_string()];
        let mut pages = vec![PageSpec {
            route: "/".to_string(),
            title: if ctx.project().name.is_empty() {
                "Home".to_string()
            } else {
                ctx.project().name.clone()
            },
            purpose: "Landing page".to_string(),
            components: shell.clone(),
        }];

        if ctx.project().features.iter().any(|f| f.requires_auth) {
            pages.push(PageSpec {
                route: "/login".to_string(),
                title: "Sign in".to_string(),
                purpose: "Account sign in and registration".to_string(),
                components: vec!["AppShell".into(), "FormField".into(), "Button".into()],
            });
        }

        let library: Vec<String> = ctx
            .components()
            .map(|c| c.names().map(str::to_string).collect())
            .unwrap_or_default();

        for feature in ctx.project().launch_features() {
            let slug = slugify(&feature.name);
            let route = format!("/{}", slug);
            if slug.is_empty() || pages.iter().any(|p| p.route == route) {
                continue;
            }
            let mut components = shell.clone();
            components.extend(
                library
                    .iter()
                    .filter(|name| name.to_lowercase().starts_with(&slug.replace('-', "")))
                    .cloned(),
            );
            pages.push(PageSpec {
                route,
                title: feature.name.clone(),
                purpose: if feature.description.is_empty() {
                    format!("{} feature", feature.name)
                } else {
                    feature.description.clone()
                },
                components,
            });
        }

        StageOutput::Pages(PageSet { pages })
    }
}

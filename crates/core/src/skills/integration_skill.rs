//! # Integration Skill
//!
//! Fifth stage: how the app reaches third-party services.

use super::{decode, ensure, prompts, schema_value, StageSkill};
use crate::generation::GenerationRequest;
use crate::pipeline::{PipelineContext, StageKind, StageOutput};
use crate::state::slugify;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntegrationSpec {
    pub service: String,
    pub purpose: String,
    /// Environment variables the client needs
    #[serde(default)]
    pub env_vars: Vec<String>,
    /// Pages or components calling the service
    #[serde(default)]
    pub modules: Vec<String>,
}

/// Output of the integrations stage; may legitimately be empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntegrationPlan {
    pub integrations: Vec<IntegrationSpec>,
}

pub struct IntegrationSkill;

/// "google maps" -> "GOOGLE_MAPS_API_KEY"
fn key_var(service: &str) -> String {
    format!("{}_API_KEY", slugify(service).replace('-', "_").to_uppercase())
}

impl StageSkill for IntegrationSkill {
    fn kind(&self) -> StageKind {
        StageKind::Integrations
    }

    fn request(&self, ctx: &PipelineContext) -> GenerationRequest {
        let mut prompt = format!("Project: {}\n", ctx.project().name);

        let named: Vec<String> = ctx
            .project()
            .launch_features()
            .flat_map(|f| f.integrations.iter().cloned())
            .collect();
        if !named.is_empty() {
            prompt.push_str(&format!("Services named by features: {}\n", named.join(", ")));
        }
        if let Some(model) = &ctx.project().business_model {
            prompt.push_str(&format!("Monetization: {:?}\n", model.monetization));
        }
        prompt.push_str(&format!("\nPrior stages:\n{}", ctx.upstream_json()));

        GenerationRequest::new(prompts::INTEGRATIONS, prompt)
            .with_schema("IntegrationPlan", schema_value::<IntegrationPlan>())
    }

    fn parse(&self, raw: Value) -> Result<StageOutput, String> {
        let plan: IntegrationPlan = decode(raw)?;
        let mut seen = HashSet::new();
        for integration in &plan.integrations {
            let slug = slugify(&integration.service);
            ensure(!slug.is_empty(), "integration without a service")?;
            ensure(
                seen.insert(slug),
                &format!("duplicate integration '{}'", integration.service),
            )?;
        }
        Ok(StageOutput::Integrations(plan))
    }

    fn fallback(&self, ctx: &PipelineContext) -> StageOutput {
        let project = ctx.project();
        let mut integrations: Vec<IntegrationSpec> = Vec::new();

        let mut add = |service: &str, purpose: String, module: &str| {
            let slug = slugify(service);
            if slug.is_empty() {
                return;
            }
            match integrations.iter_mut().find(|i| slugify(&i.service) == slug) {
                Some(existing) => {
                    if !existing.modules.iter().any(|m| m == module) {
                        existing.modules.push(module.to_string());
                    }
                }
                None => integrations.push(IntegrationSpec {
                    service: service.to_string(),
                    purpose,
                    env_vars: vec![key_var(service)],
                    modules: vec![module.to_string()],
                }),
            }
        };

        if let Some(model) = &project.business_model {
            if let (true, Some(provider)) =
                (model.monetization.takes_payments(), &model.payment_provider)
            {
                add(provider, "Payments".to_string(), "checkout");
            }
        }
        for feature in project.launch_features() {
            for service in &feature.integrations {
                add(service, format!("Used by {}", feature.name), &slugify(&feature.name));
            }
        }

        StageOutput::Integrations(IntegrationPlan { integrations })
    }
}

//! # Agreement Evaluator
//!
//! Derives the initial checklist from upstream project data.
//!
//! ## Classification
//!
//! - **critical**: without it the generated app would not work, or would be
//!   legally/financially risky (payments, data ownership, compliance, auth,
//!   credentials for integrations)
//! - **optional**: safely deferrable past launch
//! - **risky**: irreversible or costly choices (vendor lock-in, skipping the
//!   security review, building on a weak market signal)
//!
//! The evaluator only proposes an initial shape. It never touches an
//! existing [`Agreement`].

use super::checklist::{
    Agreement, ChecklistItem, ItemCategory, OptionalItem, RiskLevel, RiskyChoice,
};
use crate::state::project::{slugify, FeaturePriority, ProjectData};
use serde::{Deserialize, Serialize};

/// Validation score below which the market signal counts as weak
pub const WEAK_MARKET_SCORE: f32 = 0.4;

/// Must-have features beyond which the launch scope is flagged
pub const LARGE_SCOPE_FEATURES: usize = 12;

/// Regimes that make skipping the security review critical
const HIGH_STAKES_REGIMES: [&str; 2] = ["hipaa", "pci"];

/// Output of the evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgreementProposal {
    pub critical_items: Vec<ChecklistItem>,
    pub optional_items: Vec<OptionalItem>,
    pub risky_choices: Vec<RiskyChoice>,
    pub recommended_action: String,
}

impl AgreementProposal {
    fn insufficient(reason: &str) -> Self {
        Self {
            recommended_action: format!(
                "{} Finish feature extraction with your co-founder before generating.",
                reason
            ),
            ..Self::default()
        }
    }

    /// No checklist could be derived
    pub fn is_empty(&self) -> bool {
        self.critical_items.is_empty()
            && self.optional_items.is_empty()
            && self.risky_choices.is_empty()
    }

    pub fn into_agreement(self) -> Agreement {
        Agreement::new(self.critical_items, self.optional_items, self.risky_choices)
    }
}

/// Agreement evaluation rules
pub struct AgreementEvaluator;

impl AgreementEvaluator {
    /// Evaluate raw project data as read from storage.
    ///
    /// Absent or malformed data yields an empty proposal with an explanation.
    /// Callers must not turn an empty proposal into an agreement; generation
    /// stays blocked until data is supplied.
    pub fn evaluate_raw(raw: Option<&serde_json::Value>) -> AgreementProposal {
        let Some(raw) = raw else {
            return AgreementProposal::insufficient("No project data has been captured yet.");
        };
        if raw.is_null() {
            return AgreementProposal::insufficient("No project data has been captured yet.");
        }
        if !raw.is_object() {
            return AgreementProposal::insufficient("Project data is not a structured record.");
        }

        match serde_json::from_value::<ProjectData>(raw.clone()) {
            Ok(project) => Self::evaluate(&project),
            Err(e) => {
                tracing::warn!("Project data could not be decoded: {}", e);
                AgreementProposal::insufficient(&format!("Project data is malformed ({}).", e))
            }
        }
    }

    /// Classify a decoded project
    pub fn evaluate(project: &ProjectData) -> AgreementProposal {
        if project.features.is_empty() {
            return AgreementProposal::insufficient("The project has no extracted features.");
        }

        let critical_items = Self::critical_items(project);
        let optional_items = Self::optional_items(project);
        let risky_choices = Self::risky_choices(project);
        let recommended_action = Self::recommend(&critical_items, &risky_choices);

        AgreementProposal {
            critical_items,
            optional_items,
            risky_choices,
            recommended_action,
        }
    }

    fn critical_items(project: &ProjectData) -> Vec<ChecklistItem> {
        let mut items = Vec::new();

        let launch: Vec<&str> = project.launch_features().map(|f| f.name.as_str()).collect();
        items.push(ChecklistItem::new(
            "core-scope",
            ItemCategory::Scope,
            format!(
                "Confirm the launch scope for {}: {}",
                project.name,
                if launch.is_empty() {
                    "no must/should-have features selected".to_string()
                } else {
                    launch.join(", ")
                }
            ),
            "Founder sign-off on the feature list",
        ));

        if let Some(model) = project
            .business_model
            .as_ref()
            .filter(|m| m.monetization.takes_payments())
        {
            let description = match model.payment_provider.as_deref() {
                Some(provider) if !provider.trim().is_empty() => {
                    format!("Confirm {} as payment provider and pricing", provider.trim())
                }
                _ => "Resolve payment provider (currently unresolved)".to_string(),
            };
            items.push(ChecklistItem::new(
                "payment-provider",
                ItemCategory::Payments,
                description,
                "Active merchant account and agreed price points",
            ));
        }

        if project.handles_personal_data() {
            let terms = project
                .data_policy
                .as_ref()
                .and_then(|p| p.ownership_terms.as_deref())
                .filter(|t| !t.trim().is_empty());
            items.push(ChecklistItem::new(
                "data-ownership",
                ItemCategory::Data,
                match terms {
                    Some(t) => format!("Confirm data ownership terms: {}", t),
                    None => "Resolve data ownership terms (currently unresolved)".to_string(),
                },
                "Written terms covering user data ownership and deletion",
            ));
        }

        if let Some(policy) = &project.data_policy {
            let mut seen = Vec::new();
            for regime in &policy.compliance {
                let slug = slugify(regime);
                if slug.is_empty() || seen.contains(&slug) {
                    continue;
                }
                items.push(ChecklistItem::new(
                    format!("compliance-{}", slug),
                    ItemCategory::Legal,
                    format!("Confirm {} obligations are understood", regime.to_uppercase()),
                    "Named owner for the compliance checklist",
                ));
                seen.push(slug);
            }
        }

        if project.features.iter().any(|f| f.requires_auth) {
            items.push(ChecklistItem::new(
                "authentication",
                ItemCategory::Security,
                "Confirm the authentication approach for signed-in features",
                "Chosen identity provider or auth method",
            ));
        }

        let mut integrations: Vec<(String, String)> = Vec::new();
        for feature in project.launch_features() {
            for name in &feature.integrations {
                let slug = slugify(name);
                if !slug.is_empty() && !integrations.iter().any(|(s, _)| *s == slug) {
                    integrations.push((slug, name.trim().to_string()));
                }
            }
        }
        for (slug, name) in integrations {
            items.push(ChecklistItem::new(
                format!("integration-{}", slug),
                ItemCategory::Integrations,
                format!("Provide credentials for {}", name),
                format!("API keys or sandbox account for {}", name),
            ));
        }

        items
    }

    fn optional_items(project: &ProjectData) -> Vec<OptionalItem> {
        let mut items: Vec<OptionalItem> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for feature in project
            .features
            .iter()
            .filter(|f| f.priority == FeaturePriority::NiceToHave)
        {
            let slug = slugify(&feature.name);
            if slug.is_empty() || seen.contains(&slug) {
                continue;
            }
            items.push(OptionalItem::new(
                format!("feature-{}", slug),
                ItemCategory::Product,
                format!("Include nice-to-have feature: {}", feature.name.trim()),
                true,
            ));
            seen.push(slug);
        }

        if project.market_validation.is_none() {
            items.push(OptionalItem::new(
                "market-validation",
                ItemCategory::Market,
                "Attach a market validation summary",
                false,
            ));
        }

        items
    }

    fn risky_choices(project: &ProjectData) -> Vec<RiskyChoice> {
        let mut risks = Vec::new();
        let prefs = &project.tech_preferences;

        if prefs.skip_security_review {
            let high_stakes = project
                .data_policy
                .as_ref()
                .map(|p| {
                    p.compliance
                        .iter()
                        .any(|r| HIGH_STAKES_REGIMES.contains(&slugify(r).as_str()))
                })
                .unwrap_or(false);
            risks.push(RiskyChoice::new(
                "skip-security-review",
                "Launch without a security review",
                if high_stakes {
                    RiskLevel::Critical
                } else {
                    RiskLevel::High
                },
                "Schedule a review before handling production traffic",
            ));
        }

        let mut seen = Vec::new();
        for service in &prefs.proprietary_services {
            let slug = slugify(service);
            if slug.is_empty() || seen.contains(&slug) {
                continue;
            }
            risks.push(RiskyChoice::new(
                format!("vendor-lock-in-{}", slug),
                format!("Build core functionality on {}", service.trim()),
                RiskLevel::Medium,
                "Keep vendor calls behind an adapter so they can be swapped",
            ));
            seen.push(slug);
        }

        if let Some(validation) = &project.market_validation {
            if validation.score < WEAK_MARKET_SCORE {
                risks.push(RiskyChoice::new(
                    "weak-market-signal",
                    format!(
                        "Proceed despite a weak market signal (score {:.2})",
                        validation.score
                    ),
                    RiskLevel::Medium,
                    "Ship a landing page and measure sign-ups first",
                ));
            }
        }

        let must_haves = project
            .features
            .iter()
            .filter(|f| f.priority == FeaturePriority::MustHave)
            .count();
        if must_haves > LARGE_SCOPE_FEATURES {
            risks.push(RiskyChoice::new(
                "large-launch-scope",
                format!("Launch with {} must-have features", must_haves),
                RiskLevel::Low,
                "Cut the launch to the smallest set that proves the idea",
            ));
        }

        risks
    }

    fn recommend(critical: &[ChecklistItem], risks: &[RiskyChoice]) -> String {
        let mut action = format!(
            "Complete {} critical item{}",
            critical.len(),
            if critical.len() == 1 { "" } else { "s" }
        );
        if !risks.is_empty() {
            let worst = risks
                .iter()
                .map(|r| r.risk_level)
                .max()
                .unwrap_or(RiskLevel::Low);
            action.push_str(&format!(
                " and acknowledge {} risky choice{} (highest: {:?})",
                risks.len(),
                if risks.len() == 1 { "" } else { "s" },
                worst
            ));
        }
        action.push_str(" before generating code.");
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::project::{
        BusinessModel, DataPolicy, FeatureSpec, MarketValidation, Monetization, TechPreferences,
    };
    use serde_json::json;

    fn feature(name: &str, priority: FeaturePriority) -> FeatureSpec {
        FeatureSpec {
            name: name.to_string(),
            priority,
            ..FeatureSpec::default()
        }
    }

    fn project() -> ProjectData {
        ProjectData {
            name: "PetPal".to_string(),
            description: "Dog walking marketplace".to_string(),
            features: vec![
                FeatureSpec {
                    requires_auth: true,
                    handles_user_data: true,
                    integrations: vec!["Stripe".to_string(), "Google Maps".to_string()],
                    ..feature("Booking", FeaturePriority::MustHave)
                },
                FeatureSpec {
                    integrations: vec!["stripe".to_string()],
                    ..feature("Payouts", FeaturePriority::ShouldHave)
                },
                FeatureSpec {
                    integrations: vec!["Twilio".to_string()],
                    ..feature("Dog Diary", FeaturePriority::NiceToHave)
                },
            ],
            business_model: Some(BusinessModel {
                monetization: Monetization::Marketplace,
                payment_provider: None,
            }),
            data_policy: Some(DataPolicy {
                collects_personal_data: true,
                ownership_terms: None,
                compliance: vec!["GDPR".to_string()],
            }),
            tech_preferences: TechPreferences {
                proprietary_services: vec!["Firebase".to_string()],
                ..TechPreferences::default()
            },
            ..ProjectData::default()
        }
    }

    fn critical_ids(p: &AgreementProposal) -> Vec<&str> {
        p.critical_items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_full_classification() {
        let proposal = AgreementEvaluator::evaluate(&project());

        assert_eq!(
            critical_ids(&proposal),
            vec![
                "core-scope",
                "payment-provider",
                "data-ownership",
                "compliance-gdpr",
                "authentication",
                "integration-stripe",
                "integration-google-maps",
            ]
        );
        assert!(proposal.critical_items.iter().all(|i| !i.is_complete));
        assert!(proposal.critical_items[1].description.contains("unresolved"));

        let optional: Vec<&str> = proposal.optional_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(optional, vec!["feature-dog-diary", "market-validation"]);

        assert_eq!(proposal.risky_choices.len(), 1);
        assert_eq!(proposal.risky_choices[0].id, "vendor-lock-in-firebase");
        assert_eq!(proposal.risky_choices[0].risk_level, RiskLevel::Medium);
        assert!(!proposal.risky_choices[0].consent_granted);

        assert!(proposal.recommended_action.contains("7 critical items"));
        assert!(proposal.recommended_action.contains("1 risky choice"));
    }

    #[test]
    fn test_named_provider_and_free_product() {
        let mut p = project();
        p.business_model = Some(BusinessModel {
            monetization: Monetization::Subscription,
            payment_provider: Some("Stripe".to_string()),
        });
        let proposal = AgreementEvaluator::evaluate(&p);
        assert!(proposal.critical_items[1].description.contains("Stripe"));

        p.business_model = Some(BusinessModel {
            monetization: Monetization::Ads,
            payment_provider: None,
        });
        let proposal = AgreementEvaluator::evaluate(&p);
        assert!(!critical_ids(&proposal).contains(&"payment-provider"));
    }

    #[test]
    fn test_skip_security_review_escalates_with_hipaa() {
        let mut p = project();
        p.tech_preferences.skip_security_review = true;
        let proposal = AgreementEvaluator::evaluate(&p);
        let risk = proposal
            .risky_choices
            .iter()
            .find(|r| r.id == "skip-security-review")
            .unwrap();
        assert_eq!(risk.risk_level, RiskLevel::High);

        p.data_policy.as_mut().unwrap().compliance.push("HIPAA".to_string());
        let proposal = AgreementEvaluator::evaluate(&p);
        let risk = proposal
            .risky_choices
            .iter()
            .find(|r| r.id == "skip-security-review")
            .unwrap();
        assert_eq!(risk.risk_level, RiskLevel::Critical);
        assert!(proposal.recommended_action.contains("Critical"));
    }

    #[test]
    fn test_weak_market_and_large_scope() {
        let mut p = project();
        p.market_validation = Some(MarketValidation {
            score: 0.2,
            ..MarketValidation::default()
        });
        p.features = (0..13)
            .map(|i| feature(&format!("F{}", i), FeaturePriority::MustHave))
            .collect();

        let proposal = AgreementEvaluator::evaluate(&p);
        let ids: Vec<&str> = proposal.risky_choices.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"weak-market-signal"));
        assert!(ids.contains(&"large-launch-scope"));
        assert!(!proposal
            .optional_items
            .iter()
            .any(|i| i.id == "market-validation"));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let a = AgreementEvaluator::evaluate(&project());
        let b = AgreementEvaluator::evaluate(&project());
        assert_eq!(a, b);
    }

    #[test]
    fn test_optional_feature_ids_unique() {
        let mut p = project();
        p.features.push(feature("Chat", FeaturePriority::NiceToHave));
        p.features.push(feature("chat!", FeaturePriority::NiceToHave));
        p.features.push(feature("???", FeaturePriority::NiceToHave));

        let proposal = AgreementEvaluator::evaluate(&p);
        let optional: Vec<&str> = proposal.optional_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            optional,
            vec!["feature-dog-diary", "feature-chat", "market-validation"]
        );

        // Every optional item is reachable by its id
        let mut agreement = proposal.into_agreement();
        for id in ["feature-dog-diary", "feature-chat", "market-validation"] {
            let before = agreement.optional_items.iter().find(|i| i.id == id).unwrap().is_included;
            assert_eq!(
                crate::agreement::ConsentGate::toggle_optional(&mut agreement, id).unwrap(),
                !before
            );
        }
    }

    #[test]
    fn test_absent_and_malformed_data() {
        let proposal = AgreementEvaluator::evaluate_raw(None);
        assert!(proposal.is_empty());
        assert!(proposal.recommended_action.contains("No project data"));

        let proposal = AgreementEvaluator::evaluate_raw(Some(&json!("just a string")));
        assert!(proposal.is_empty());

        let proposal = AgreementEvaluator::evaluate_raw(Some(&json!({"name": 42})));
        assert!(proposal.is_empty());
        assert!(proposal.recommended_action.contains("malformed"));

        let proposal = AgreementEvaluator::evaluate_raw(Some(&json!({"name": "Empty"})));
        assert!(proposal.is_empty());
        assert!(proposal.recommended_action.contains("no extracted features"));
    }

    #[test]
    fn test_raw_roundtrip_matches_typed() {
        let raw = serde_json::to_value(project()).unwrap();
        assert_eq!(
            AgreementEvaluator::evaluate_raw(Some(&raw)),
            AgreementEvaluator::evaluate(&project())
        );
    }
}

//! # Project Data
//!
//! Upstream output of the ideation flow: the founder's idea, extracted
//! features, business model, data policy and market validation.

use serde::{Deserialize, Serialize};

/// Relative importance of an extracted feature
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeaturePriority {
    MustHave,
    #[default]
    ShouldHave,
    NiceToHave,
}

/// A feature extracted from the founder conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: FeaturePriority,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub handles_user_data: bool,
    /// Third-party services the feature talks to (e.g. "stripe", "twilio")
    #[serde(default)]
    pub integrations: Vec<String>,
}

/// How the product makes money
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Monetization {
    #[default]
    Free,
    Subscription,
    OneTime,
    Marketplace,
    Ads,
}

impl Monetization {
    /// Whether money moves through the product itself
    pub fn takes_payments(&self) -> bool {
        matches!(
            self,
            Monetization::Subscription | Monetization::OneTime | Monetization::Marketplace
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BusinessModel {
    #[serde(default)]
    pub monetization: Monetization,
    #[serde(default)]
    pub payment_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DataPolicy {
    #[serde(default)]
    pub collects_personal_data: bool,
    /// Agreed terms on who owns user data, if settled
    #[serde(default)]
    pub ownership_terms: Option<String>,
    /// Compliance regimes in scope ("gdpr", "hipaa", "pci", ...)
    #[serde(default)]
    pub compliance: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TechPreferences {
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub hosting: Option<String>,
    /// Proprietary services the founder wants to build on
    #[serde(default)]
    pub proprietary_services: Vec<String>,
    #[serde(default)]
    pub skip_security_review: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MarketValidation {
    /// Confidence in demand, 0.0 - 1.0
    pub score: f32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub competitors: Vec<String>,
}

/// Everything upstream of CTO Studio
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProjectData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub business_model: Option<BusinessModel>,
    #[serde(default)]
    pub data_policy: Option<DataPolicy>,
    #[serde(default)]
    pub tech_preferences: TechPreferences,
    #[serde(default)]
    pub market_validation: Option<MarketValidation>,
    /// Founder messages from the co-founder chat, oldest first
    #[serde(default)]
    pub conversation: Vec<String>,
}

impl ProjectData {
    /// Features that must or should ship
    pub fn launch_features(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features
            .iter()
            .filter(|f| f.priority != FeaturePriority::NiceToHave)
    }

    pub fn handles_personal_data(&self) -> bool {
        self.data_policy
            .as_ref()
            .map(|p| p.collects_personal_data)
            .unwrap_or(false)
            || self.features.iter().any(|f| f.handles_user_data)
    }
}

/// Lowercase, dash-separated identifier fragment
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut dash = false;
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

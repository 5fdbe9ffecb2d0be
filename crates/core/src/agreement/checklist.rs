//! # Agreement Checklist Types
//!
//! The Founder-Cofounder Agreement: critical items the founder must confirm,
//! optional items that are advisory, and risky choices needing consent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Area a checklist item belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Scope,
    Payments,
    Data,
    Legal,
    Security,
    Integrations,
    Product,
    Market,
}

/// A requirement that must be satisfied before generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub id: String,
    pub category: ItemCategory,
    pub description: String,
    /// What the founder must be able to show to tick the item
    pub evidence_requirement: String,
    pub is_complete: bool,
}

impl ChecklistItem {
    pub fn new(
        id: impl Into<String>,
        category: ItemCategory,
        description: impl Into<String>,
        evidence_requirement: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            evidence_requirement: evidence_requirement.into(),
            is_complete: false,
        }
    }
}

/// A deferrable item; inclusion never gates generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionalItem {
    pub id: String,
    pub category: ItemCategory,
    pub description: String,
    pub is_included: bool,
}

impl OptionalItem {
    pub fn new(
        id: impl Into<String>,
        category: ItemCategory,
        description: impl Into<String>,
        is_included: bool,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            is_included,
        }
    }
}

/// Severity of a risky choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// A decision with adverse consequences, admitted only with explicit consent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskyChoice {
    pub id: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub mitigation: String,
    pub consent_granted: bool,
}

impl RiskyChoice {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        risk_level: RiskLevel,
        mitigation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            risk_level,
            mitigation: mitigation.into(),
            consent_granted: false,
        }
    }
}

/// Aggregate agreement state
///
/// `is_complete` is derived: every critical item complete and every risky
/// choice consented. Mutations go through [`ConsentGate`](super::ConsentGate),
/// which keeps it in sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Agreement {
    pub critical_items: Vec<ChecklistItem>,
    pub optional_items: Vec<OptionalItem>,
    pub risky_choices: Vec<RiskyChoice>,
    #[serde(default)]
    pub is_complete: bool,
    /// First time the agreement was complete; never cleared
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Agreement {
    pub fn new(
        critical_items: Vec<ChecklistItem>,
        optional_items: Vec<OptionalItem>,
        risky_choices: Vec<RiskyChoice>,
    ) -> Self {
        let mut agreement = Self {
            critical_items,
            optional_items,
            risky_choices,
            is_complete: false,
            timestamp: None,
        };
        agreement.refresh();
        agreement
    }

    /// Whether the derived invariant holds right now
    pub fn derive_complete(&self) -> bool {
        self.critical_items.iter().all(|i| i.is_complete)
            && self.risky_choices.iter().all(|r| r.consent_granted)
    }

    /// Recompute `is_complete` and stamp the first completion.
    ///
    /// Also used after loading from storage, since the stored flag may be stale.
    pub fn refresh(&mut self) {
        self.is_complete = self.derive_complete();
        if self.is_complete && self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
    }

    pub fn critical(&self, id: &str) -> Option<&ChecklistItem> {
        self.critical_items.iter().find(|i| i.id == id)
    }

    pub fn risky(&self, id: &str) -> Option<&RiskyChoice> {
        self.risky_choices.iter().find(|r| r.id == id)
    }

    pub fn pending_critical(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.critical_items.iter().filter(|i| !i.is_complete)
    }

    pub fn pending_risks(&self) -> impl Iterator<Item = &RiskyChoice> {
        self.risky_choices.iter().filter(|r| !r.consent_granted)
    }

    /// Settled items (completed or consented) over total, as a whole percentage
    pub fn readiness_percent(&self) -> u8 {
        let total = self.critical_items.len() + self.risky_choices.len();
        if total == 0 {
            return 100;
        }
        let done = self.critical_items.iter().filter(|i| i.is_complete).count()
            + self.risky_choices.iter().filter(|r| r.consent_granted).count();
        ((done * 100) / total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ChecklistItem {
        ChecklistItem::new(id, ItemCategory::Scope, "desc", "evidence")
    }

    #[test]
    fn test_empty_agreement_is_complete() {
        let agreement = Agreement::new(vec![], vec![], vec![]);
        assert!(agreement.is_complete);
        assert!(agreement.timestamp.is_some());
        assert_eq!(agreement.readiness_percent(), 100);
    }

    #[test]
    fn test_new_items_start_pending() {
        let agreement = Agreement::new(
            vec![item("a")],
            vec![],
            vec![RiskyChoice::new("r", "risk", RiskLevel::High, "mitigate")],
        );
        assert!(!agreement.is_complete);
        assert!(agreement.timestamp.is_none());
        assert_eq!(agreement.pending_critical().count(), 1);
        assert_eq!(agreement.pending_risks().count(), 1);
        assert_eq!(agreement.readiness_percent(), 0);
    }

    #[test]
    fn test_refresh_corrects_stale_flag() {
        let json = r#"{
            "critical_items": [{"id":"a","category":"scope","description":"d","evidence_requirement":"e","is_complete":false}],
            "optional_items": [],
            "risky_choices": [],
            "is_complete": true
        }"#;
        let mut agreement: Agreement = serde_json::from_str(json).unwrap();
        agreement.refresh();
        assert!(!agreement.is_complete);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
    }
}

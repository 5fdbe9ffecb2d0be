//! # Consent Gate
//!
//! Admits or blocks the generation pipeline based on the agreement.
//! All operations are pure and synchronous; persistence lives in
//! [`AgreementSession`](super::AgreementSession).

use super::checklist::Agreement;
use thiserror::Error;

/// Rejected agreement mutation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("unknown critical item: {0}")]
    UnknownCriticalItem(String),
    #[error("unknown optional item: {0}")]
    UnknownOptionalItem(String),
    #[error("unknown risky choice: {0}")]
    UnknownRiskyChoice(String),
    #[error("consent batch is empty")]
    EmptyBatch,
}

/// Gate evaluation verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub open: bool,
    /// Critical items still incomplete
    pub pending_items: Vec<String>,
    /// Risky choices still lacking consent
    pub pending_consent: Vec<String>,
}

impl GateVerdict {
    /// Human-readable reason the gate is closed
    pub fn reason(&self) -> String {
        if self.open {
            return "Agreement complete".to_string();
        }
        let mut parts = Vec::new();
        if !self.pending_items.is_empty() {
            parts.push(format!(
                "incomplete critical items: {}",
                self.pending_items.join(", ")
            ));
        }
        if !self.pending_consent.is_empty() {
            parts.push(format!(
                "risky choices awaiting consent: {}",
                self.pending_consent.join(", ")
            ));
        }
        parts.join("; ")
    }
}

/// Consent gate rules
pub struct ConsentGate;

impl ConsentGate {
    /// All critical items complete and all risky choices consented.
    ///
    /// Evaluated live from the items, never from a cached flag, so revoking
    /// a completion closes the gate immediately.
    pub fn can_proceed(agreement: &Agreement) -> bool {
        agreement.derive_complete()
    }

    pub fn evaluate(agreement: &Agreement) -> GateVerdict {
        let pending_items: Vec<String> =
            agreement.pending_critical().map(|i| i.id.clone()).collect();
        let pending_consent: Vec<String> =
            agreement.pending_risks().map(|r| r.id.clone()).collect();

        GateVerdict {
            open: pending_items.is_empty() && pending_consent.is_empty(),
            pending_items,
            pending_consent,
        }
    }

    /// Flip one critical item's completion; returns the new value
    pub fn toggle_critical(agreement: &mut Agreement, id: &str) -> Result<bool, GateError> {
        let item = agreement
            .critical_items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| GateError::UnknownCriticalItem(id.to_string()))?;

        item.is_complete = !item.is_complete;
        let now_complete = item.is_complete;
        agreement.refresh();

        tracing::debug!(item = id, complete = now_complete, "Critical item toggled");
        Ok(now_complete)
    }

    /// Flip one optional item's inclusion; never affects the gate
    pub fn toggle_optional(agreement: &mut Agreement, id: &str) -> Result<bool, GateError> {
        let item = agreement
            .optional_items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| GateError::UnknownOptionalItem(id.to_string()))?;

        item.is_included = !item.is_included;
        Ok(item.is_included)
    }

    /// Grant consent for a batch of risky choices.
    ///
    /// The whole batch is validated before anything changes: an unknown id
    /// leaves the agreement untouched. Already-granted choices stay granted.
    pub fn grant_consent(agreement: &mut Agreement, ids: &[String]) -> Result<(), GateError> {
        if ids.is_empty() {
            return Err(GateError::EmptyBatch);
        }

        if let Some(unknown) = ids.iter().find(|id| agreement.risky(id).is_none()) {
            return Err(GateError::UnknownRiskyChoice(unknown.clone()));
        }

        for choice in agreement
            .risky_choices
            .iter_mut()
            .filter(|r| ids.contains(&r.id))
        {
            choice.consent_granted = true;
        }
        agreement.refresh();

        tracing::info!(count = ids.len(), complete = agreement.is_complete, "Consent granted");
        Ok(())
    }
}

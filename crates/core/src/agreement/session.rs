//! # Agreement Session
//!
//! The agreement as the founder edits it: every mutation is applied to a
//! working copy, persisted, and only then committed. A failed write leaves
//! the visible agreement exactly as it was.

use super::checklist::Agreement;
use super::evaluator::{AgreementEvaluator, AgreementProposal};
use super::gate::{ConsentGate, GateError, GateVerdict};
use crate::state::{keys, load_json, save_json, KeyValueStore};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Persisted, user-driven agreement state
pub struct AgreementSession {
    agreement: Agreement,
    recommended_action: String,
    /// No usable project data yet; mutations are refused
    blocked: bool,
    store: Arc<dyn KeyValueStore>,
}

impl AgreementSession {
    /// Resume the stored agreement, or start empty
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        match load_json::<Agreement>(store.as_ref(), keys::AGREEMENT)? {
            Some(mut agreement) => {
                agreement.refresh();
                Ok(Self {
                    recommended_action: Self::describe(&agreement),
                    agreement,
                    blocked: false,
                    store,
                })
            }
            None => Ok(Self::blocked(
                store,
                "No agreement yet. Evaluate the project to build the checklist.".to_string(),
            )),
        }
    }

    fn blocked(store: Arc<dyn KeyValueStore>, reason: String) -> Self {
        Self {
            agreement: Agreement::new(vec![blocked_item(&reason)], vec![], vec![]),
            recommended_action: reason,
            blocked: true,
            store,
        }
    }

    /// Evaluate the stored project data and replace the agreement with the proposal.
    ///
    /// An empty proposal is not persisted and yields a blocked session whose
    /// sentinel item keeps the gate closed.
    pub fn propose_from_store(store: Arc<dyn KeyValueStore>) -> Result<(Self, AgreementProposal)> {
        let raw: Option<serde_json::Value> = load_json(store.as_ref(), keys::PROJECT_DATA)
            .unwrap_or_else(|e| {
                tracing::warn!("Unreadable project data: {:#}", e);
                Some(serde_json::Value::String("<unreadable>".to_string()))
            });
        let proposal = AgreementEvaluator::evaluate_raw(raw.as_ref());
        let session = Self::from_proposal(store, proposal.clone())?;
        Ok((session, proposal))
    }

    pub fn from_proposal(store: Arc<dyn KeyValueStore>, proposal: AgreementProposal) -> Result<Self> {
        if proposal.is_empty() {
            // A previously stored agreement must not outlive the data it was built from
            store
                .remove(keys::AGREEMENT)
                .context("Failed to clear stale agreement")?;
            return Ok(Self::blocked(store, proposal.recommended_action));
        }

        let recommended_action = proposal.recommended_action.clone();
        let agreement = proposal.into_agreement();
        save_json(store.as_ref(), keys::AGREEMENT, &agreement).context("Failed to save agreement")?;

        Ok(Self {
            agreement,
            recommended_action,
            blocked: false,
            store,
        })
    }

    /// Drop the agreement because the project data it was built from changed.
    ///
    /// The stored agreement is removed before the session blocks, so neither
    /// this process nor a restarted one can run the new data under it.
    pub fn invalidate(&mut self, reason: impl Into<String>) -> Result<()> {
        self.store
            .remove(keys::AGREEMENT)
            .context("Failed to clear agreement")?;
        *self = Self::blocked(self.store.clone(), reason.into());
        Ok(())
    }

    pub fn agreement(&self) -> &Agreement {
        &self.agreement
    }

    /// Detached copy for a pipeline run
    pub fn snapshot(&self) -> Agreement {
        self.agreement.clone()
    }

    pub fn recommended_action(&self) -> &str {
        &self.recommended_action
    }

    pub fn can_proceed(&self) -> bool {
        !self.blocked && ConsentGate::can_proceed(&self.agreement)
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn verdict(&self) -> GateVerdict {
        ConsentGate::evaluate(&self.agreement)
    }

    pub fn toggle_critical(&mut self, id: &str) -> Result<bool, SessionError> {
        self.commit(|a| ConsentGate::toggle_critical(a, id))
    }

    pub fn toggle_optional(&mut self, id: &str) -> Result<bool, SessionError> {
        self.commit(|a| ConsentGate::toggle_optional(a, id))
    }

    /// Grant a consent batch: all of it becomes visible, or none of it
    pub fn grant_consent(&mut self, ids: &[String]) -> Result<(), SessionError> {
        self.commit(|a| ConsentGate::grant_consent(a, ids))
    }

    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Agreement) -> Result<T, GateError>,
    ) -> Result<T, SessionError> {
        if self.blocked {
            return Err(SessionError::Blocked(self.recommended_action.clone()));
        }
        let mut working = self.agreement.clone();
        let out = change(&mut working)?;

        save_json(self.store.as_ref(), keys::AGREEMENT, &working)
            .map_err(|e| SessionError::Persist(format!("{:#}", e)))?;

        self.recommended_action = Self::describe(&working);
        self.agreement = working;
        Ok(out)
    }

    fn describe(agreement: &Agreement) -> String {
        let verdict = ConsentGate::evaluate(agreement);
        if verdict.open {
            "Agreement complete. Ready to generate.".to_string()
        } else {
            format!("Before generating: {}", verdict.reason())
        }
    }
}

/// Sentinel item that keeps the gate closed while data is missing
fn blocked_item(reason: &str) -> super::checklist::ChecklistItem {
    super::checklist::ChecklistItem::new(
        "project-data",
        super::checklist::ItemCategory::Scope,
        reason,
        "Project data with at least one extracted feature",
    )
}

/// Failed session mutation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("agreement unavailable: {0}")]
    Blocked(String),
    #[error("failed to persist agreement: {0}")]
    Persist(String),
}

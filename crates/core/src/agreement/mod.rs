//! # Founder-Cofounder Agreement
//!
//! Derives the agreement checklist from project data and gates code
//! generation on it.

pub mod checklist;
pub mod evaluator;
pub mod gate;
pub mod session;

pub use checklist::{
    Agreement, ChecklistItem, ItemCategory, OptionalItem, RiskLevel, RiskyChoice,
};
pub use evaluator::{AgreementEvaluator, AgreementProposal};
pub use gate::{ConsentGate, GateError, GateVerdict};
pub use session::{AgreementSession, SessionError};

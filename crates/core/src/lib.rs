//! # Studio Core
//!
//! The CTO Studio brain: derives the founder-cofounder agreement from
//! project data, gates code generation on it, and runs the staged
//! generation pipeline.
//!
//! ## Architecture
//!
//! - `agreement/` - Checklist evaluation, consent gate, persisted session
//! - `pipeline/` - Orchestrator, stage runner, run tokens, progress
//! - `skills/` - One skill per stage plus page mockups
//! - `generation/` - Generation ports and the HTTP provider
//! - `state/` - Project data and key/value persistence
//! - `config`, `models` - Runtime configuration and provider selection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use studio_core::pipeline::PipelineOrchestrator;
//!
//! let orchestrator = PipelineOrchestrator::new(generator, store, &config.pipeline);
//! let run = orchestrator.execute(project, &session.snapshot()).await?;
//! ```

pub mod agreement;
pub mod config;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod skills;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

//! # Studio Configuration
//!
//! Runtime directory resolution and the persisted `config.json`.
//! Missing or unreadable files fall back to defaults so a fresh checkout runs.

use crate::models::ModelConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable overriding the runtime directory
pub const RUNTIME_PATH_ENV: &str = "STUDIO_RUNTIME_PATH";

/// Get the runtime directory path (.studio)
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var(RUNTIME_PATH_ENV) {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".studio")
}

/// Ensure the runtime directory exists
pub async fn ensure_runtime_dir() -> Result<PathBuf> {
    let path = get_runtime_path();
    fs::create_dir_all(&path)
        .await
        .with_context(|| format!("Failed to create runtime directory: {:?}", path))?;
    Ok(path)
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Delay between stages, a courtesy to the generation API
    pub pacing_ms: u64,
    /// Upper bound for one generation attempt
    pub stage_timeout_secs: u64,
    /// Extra attempts after the first before falling back
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 750,
            stage_timeout_secs: 90,
            max_retries: 1,
        }
    }
}

impl PipelineConfig {
    /// No pacing, short timeout; used by tests and headless runs
    pub fn immediate() -> Self {
        Self {
            pacing_ms: 0,
            stage_timeout_secs: 5,
            max_retries: 1,
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// Top-level configuration persisted at `<runtime>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudioConfig {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    /// HTTP port for `studio serve`
    pub port: u16,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            pipeline: PipelineConfig::default(),
            port: 8080,
        }
    }
}

impl StudioConfig {
    /// Path of the config file inside the runtime directory
    pub fn path() -> PathBuf {
        get_runtime_path().join("config.json")
    }

    /// Load from the runtime directory, defaulting when absent
    pub async fn load() -> Self {
        Self::load_from(&Self::path()).await
    }

    pub async fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.pipeline.max_retries, 1);
        assert_eq!(config.pipeline.pacing(), Duration::from_millis(750));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: StudioConfig = serde_json::from_str(r#"{"pipeline":{"pacing_ms":0}}"#).unwrap();
        assert_eq!(config.pipeline.pacing_ms, 0);
        assert_eq!(config.pipeline.stage_timeout_secs, 90);
        assert_eq!(config.port, 8080);
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("studio-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let mut config = StudioConfig::default();
        config.port = 9090;
        config.save_to(&path).await.unwrap();

        let loaded = StudioConfig::load_from(&path).await;
        assert_eq!(loaded.port, 9090);

        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_missing_file_defaults() {
        let loaded = StudioConfig::load_from(Path::new("/nonexistent/studio/config.json")).await;
        assert_eq!(loaded, StudioConfig::default());
    }
}

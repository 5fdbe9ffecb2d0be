//! # Generation Ports
//!
//! The single I/O boundary of the pipeline: a text/structured generation
//! call and, for mockups, an image generation call. Everything behind these
//! traits is opaque to the orchestrator.

pub mod http;

pub use http::HttpGenerator;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure of an external generation call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("missing credentials: {0}")]
    MissingKey(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// One generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instructions for the stage
    pub system: String,
    /// User prompt built from the accumulated context
    pub prompt: String,
    /// JSON schema of the expected structured output
    pub schema: Option<Value>,
    /// Name reported to the provider alongside the schema
    pub schema_name: String,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            schema: None,
            schema_name: "output".to_string(),
        }
    }

    /// Request structured output conforming to `schema`
    pub fn with_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.schema_name = name.into();
        self.schema = Some(schema);
        self
    }
}

/// Text or structured generation
///
/// Returns a JSON value when a schema was supplied, otherwise a JSON string
/// holding the free-text content. The value is untrusted: callers validate it.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn invoke(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Image generation for mockups; returns the image URL
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("sys", "prompt")
            .with_schema("ContextAnalysis", serde_json::json!({"type": "object"}));
        assert_eq!(request.schema_name, "ContextAnalysis");
        assert!(request.schema.is_some());
    }

    #[test]
    fn test_error_display() {
        let err = GenerationError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "provider returned status 429: slow down");
        assert_eq!(GenerationError::Timeout(5).to_string(), "timed out after 5s");
    }
}

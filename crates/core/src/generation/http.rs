//! # HTTP Generator
//!
//! OpenAI-compatible chat completions and image generation over `reqwest`.
//! Every configured provider is reached through its OpenAI-compatible root.

use super::{GenerationError, GenerationRequest, Generator, ImageGenerator};
use crate::models::ModelConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

/// Generator backed by a provider's HTTP API
#[derive(Clone)]
pub struct HttpGenerator {
    config: ModelConfig,
    client: Client,
}

impl HttpGenerator {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn api_key(&self) -> Result<String, GenerationError> {
        self.config
            .api_key()
            .map_err(|e| GenerationError::MissingKey(e.to_string()))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, GenerationError> {
        let url = format!("{}/{}", self.config.endpoint(), path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

/// Build the chat completions body for a request
fn chat_body(model: &str, request: &GenerationRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.prompt },
        ],
    });
    if let Some(schema) = &request.schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": request.schema_name,
                "schema": schema,
            }
        });
    }
    body
}

/// Pull the message content out of a chat completions response.
///
/// Structured requests get the content parsed as JSON; free-text requests get
/// it back as a JSON string.
fn extract_content(body: Value, structured: bool) -> Result<Value, GenerationError> {
    let response: ChatResponse =
        serde_json::from_value(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))?;

    let text = match choice.message.content {
        Value::String(text) => text,
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other if structured && other.is_object() => return Ok(other),
        _ => return Err(GenerationError::Malformed("empty message content".to_string())),
    };

    if !structured {
        return Ok(Value::String(text.trim().to_string()));
    }

    serde_json::from_str(strip_fences(&text))
        .map_err(|e| GenerationError::Malformed(format!("content is not JSON: {}", e)))
}

/// Some providers wrap JSON in markdown fences even in JSON mode
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn invoke(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        tracing::debug!(
            provider = self.config.provider.display_name(),
            model = %self.config.model,
            schema = %request.schema_name,
            "Invoking generation"
        );
        let body = chat_body(&self.config.model, request);
        let response = self.post("chat/completions", &body).await?;
        extract_content(response, request.schema.is_some())
    }
}

#[async_trait]
impl ImageGenerator for HttpGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<String, GenerationError> {
        if !self.config.provider.supports_images() {
            return Err(GenerationError::Transport(format!(
                "{} has no image endpoint",
                self.config.provider.display_name()
            )));
        }
        let model = self
            .config
            .image_model
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_MODEL);
        let body = json!({
            "model": model,
            "prompt": prompt,
            "n": 1,
            "size": IMAGE_SIZE,
        });
        let response = self.post("images/generations", &body).await?;
        let parsed: ImageResponse = serde_json::from_value(response)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| GenerationError::Malformed("no image url in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: Value) -> Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[test]
    fn test_structured_content_parsed() {
        let body = response(json!("{\"summary\": \"ok\"}"));
        let value = extract_content(body, true).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn test_fenced_json_accepted() {
        let body = response(json!("```json\n{\"a\": 1}\n```"));
        assert_eq!(extract_content(body, true).unwrap()["a"], 1);
    }

    #[test]
    fn test_free_text_returned_as_string() {
        let body = response(json!("  hello  "));
        assert_eq!(extract_content(body, false).unwrap(), json!("hello"));
    }

    #[test]
    fn test_non_json_structured_content_is_malformed() {
        let body = response(json!("sorry, I can't"));
        assert!(matches!(
            extract_content(body, true),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_choices_is_malformed() {
        assert!(matches!(
            extract_content(json!({ "choices": [] }), true),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_chat_body_carries_schema() {
        let request = GenerationRequest::new("sys", "hi")
            .with_schema("PageSet", json!({ "type": "object" }));
        let body = chat_body("gpt-4o", &request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["response_format"]["json_schema"]["name"], "PageSet");

        let plain = chat_body("gpt-4o", &GenerationRequest::new("sys", "hi"));
        assert!(plain.get("response_format").is_none());
    }
}

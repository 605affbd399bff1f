//! Gemini `generateContent` backend.
//!
//! Requests JSON output constrained by the categorization schema. Images
//! travel inline as base64 parts next to the prompt text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use pocket_core::{defaults, Error, GenerationBackend, ModelImage, ModelReply, Result};

use crate::generation::{categorization_schema, GenerationSettings};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub base_url: String,
    pub timeout_seconds: u64,
    pub settings: GenerationSettings,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: defaults::GEMINI_MODEL.to_string(),
            base_url: defaults::GEMINI_URL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
            settings: GenerationSettings::default(),
        }
    }

    /// Read `GEMINI_API_KEY` (required), `GEMINI_MODEL`, `GEMINI_BASE_URL`
    /// and `GEMINI_TIMEOUT`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = url;
        }
        config.timeout_seconds = std::env::var("GEMINI_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);

        Ok(config)
    }
}

/// Gemini generation backend.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "gemini",
            model = %config.model,
            url = %config.base_url,
            "Initializing Gemini backend"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn model_url(&self) -> String {
        format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, prompt: &str, image: Option<&ModelImage>) -> GenerateContentRequest {
        let mut parts = vec![Part::text(prompt)];
        if let Some(image) = image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: BASE64.encode(&image.data),
                }),
            });
        }

        let settings = &self.config.settings;
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                top_k: settings.top_k,
                top_p: settings.top_p,
                max_output_tokens: settings.max_output_tokens,
                response_mime_type: "application/json".to_string(),
                response_schema: to_gemini_schema(&categorization_schema()),
            },
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    #[instrument(
        skip(self, prompt, image),
        fields(
            subsystem = "inference",
            component = "gemini",
            op = "generate",
            model = %self.config.model,
            prompt_len = prompt.len(),
            has_image = image.is_some()
        )
    )]
    async fn generate(&self, prompt: &str, image: Option<&ModelImage>) -> Result<ModelReply> {
        let start = Instant::now();
        let request = self.build_request(prompt, image);

        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<GeminiErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => "Unknown error".to_string(),
            };
            warn!(status = %status, error = %message, "Gemini returned an error");
            return Err(Error::Inference(format!(
                "Gemini returned {}: {}",
                status, message
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse Gemini response: {}", e)))?;

        let reply = body.into_reply();

        debug!(
            finish_reason = reply.finish_reason.as_deref().unwrap_or("none"),
            response_len = reply.text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini generation complete"
        );
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.model_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!(subsystem = "inference", component = "gemini", "Gemini health check passed");
                Ok(true)
            }
            Ok(resp) => {
                warn!(
                    subsystem = "inference",
                    component = "gemini",
                    status = %resp.status(),
                    "Gemini health check failed"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "gemini",
                    error = %e,
                    "Gemini health check error"
                );
                Ok(false)
            }
        }
    }
}

/// Convert a JSON Schema into Gemini's OpenAPI subset (uppercase type names).
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let converted = match (k.as_str(), v) {
                        ("type", Value::String(t)) => Value::String(t.to_uppercase()),
                        _ => to_gemini_schema(v),
                    };
                    (k.clone(), converted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_reply(self) -> ModelReply {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return ModelReply {
                text: String::new(),
                finish_reason: block_reason,
            };
        };

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        ModelReply {
            text: text.trim().to_string(),
            finish_reason: candidate.finish_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> GeminiBackend {
        GeminiBackend::new(GeminiConfig::new("test-key")).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = GeminiConfig::new("k");
        assert_eq!(config.model, defaults::GEMINI_MODEL);
        assert_eq!(config.base_url, defaults::GEMINI_URL);
        assert_eq!(config.timeout_seconds, 60);
        assert_eq!(config.settings, GenerationSettings::default());
    }

    #[test]
    fn test_schema_types_are_uppercased() {
        let schema = to_gemini_schema(&categorization_schema());
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["category"]["type"], "STRING");
        assert_eq!(schema["properties"]["confidence"]["type"], "NUMBER");
        assert_eq!(schema["properties"]["alternatives"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["alternatives"]["items"]["type"], "STRING");
        assert_eq!(schema["required"][0], "category");
    }

    #[test]
    fn test_request_serialization_text_only() {
        let request = backend().build_request("hello", None);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["contents"][0]["parts"].as_array().unwrap().len(), 1);

        let config = &value["generationConfig"];
        assert_eq!(config["topK"], 40);
        assert_eq!(config["maxOutputTokens"], 200);
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_request_serialization_with_image() {
        let image = ModelImage {
            data: vec![0xff, 0xd8, 0xff],
            mime_type: "image/jpeg".to_string(),
        };
        let request = backend().build_request("describe", Some(&image));
        let value = serde_json::to_value(&request).unwrap();

        let inline = &value["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], "image/jpeg");
        assert_eq!(inline["data"], "/9j/");
        assert!(value["contents"][0]["parts"][1].get("text").is_none());
    }

    #[test]
    fn test_response_joins_text_parts() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"category\":"}, {"text": "\"Work\"}"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let reply = body.into_reply();
        assert_eq!(reply.text, "{\"category\":\"Work\"}");
        assert_eq!(reply.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_response_without_candidates() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let reply = body.into_reply();
        assert!(reply.text.is_empty());
        assert_eq!(reply.finish_reason.as_deref(), Some("SAFETY"));
    }
}

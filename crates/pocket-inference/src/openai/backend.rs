//! OpenAI-compatible generation backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use pocket_core::{defaults, Error, GenerationBackend, ModelImage, ModelReply, Result};

use super::types::*;
use crate::generation::{categorization_schema, GenerationSettings};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    pub timeout_seconds: u64,
    /// Send a `json_schema` response format. Some local servers only
    /// understand plain prompting, so this can be switched off.
    pub structured_output: bool,
    pub settings: GenerationSettings,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            gen_model: defaults::OPENAI_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
            structured_output: true,
            settings: GenerationSettings::default(),
        }
    }
}

impl OpenAIConfig {
    /// Read `OPENAI_BASE_URL`, `OPENAI_API_KEY`, `OPENAI_GEN_MODEL`,
    /// `OPENAI_TIMEOUT` and `OPENAI_STRUCTURED_OUTPUT`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| defaults::OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            gen_model: std::env::var("OPENAI_GEN_MODEL")
                .unwrap_or_else(|_| defaults::OPENAI_MODEL.to_string()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
            structured_output: std::env::var("OPENAI_STRUCTURED_OUTPUT")
                .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
                .unwrap_or(true),
            settings: GenerationSettings::default(),
        }
    }
}

/// OpenAI-compatible generation backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            model = %config.gen_model,
            "Initializing OpenAI-compatible backend"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref api_key) => req.header("Authorization", format!("Bearer {}", api_key)),
            None => req,
        }
    }

    fn build_request(&self, prompt: &str, image: Option<&ModelImage>) -> ChatCompletionRequest {
        let content = match image {
            None => MessageContent::Text(prompt.to_string()),
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!(
                            "data:{};base64,{}",
                            image.mime_type,
                            BASE64.encode(&image.data)
                        ),
                    },
                },
            ]),
        };

        let response_format = self.config.structured_output.then(|| ResponseFormat {
            format_type: "json_schema".to_string(),
            json_schema: JsonSchemaFormat {
                name: "categorization".to_string(),
                schema: categorization_schema(),
                strict: false,
            },
        });

        let settings = &self.config.settings;
        ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            temperature: Some(settings.temperature),
            top_p: Some(settings.top_p),
            max_tokens: Some(settings.max_output_tokens),
            response_format,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    #[instrument(
        skip(self, prompt, image),
        fields(
            subsystem = "inference",
            component = "openai",
            op = "generate",
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            has_image = image.is_some()
        )
    )]
    async fn generate(&self, prompt: &str, image: Option<&ModelImage>) -> Result<ModelReply> {
        let start = Instant::now();
        let request = self.build_request(prompt, image);

        let response = self
            .with_auth(self.client.post(self.url("/chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<OpenAIErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => "Unknown error".to_string(),
            };
            warn!(status = %status, error = %message, "OpenAI-compatible endpoint returned an error");
            return Err(Error::Inference(format!(
                "OpenAI returned {}: {}",
                status, message
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let reply = match result.choices.into_iter().next() {
            Some(choice) => ModelReply {
                text: choice.message.content.unwrap_or_default().trim().to_string(),
                finish_reason: choice.finish_reason,
            },
            None => ModelReply::default(),
        };

        debug!(
            finish_reason = reply.finish_reason.as_deref().unwrap_or("none"),
            response_len = reply.text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .with_auth(self.client.get(self.url("/models")))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!(subsystem = "inference", component = "openai", "OpenAI health check passed");
                Ok(true)
            }
            Ok(resp) => {
                warn!(
                    subsystem = "inference",
                    component = "openai",
                    status = %resp.status(),
                    "OpenAI health check failed"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "openai",
                    error = %e,
                    "OpenAI health check error"
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, defaults::OPENAI_URL);
        assert_eq!(config.gen_model, defaults::OPENAI_MODEL);
        assert_eq!(config.timeout_seconds, 60);
        assert!(config.api_key.is_none());
        assert!(config.structured_output);
    }

    #[test]
    fn test_request_uses_settings_and_schema() {
        let backend = OpenAIBackend::new(OpenAIConfig::default()).unwrap();
        let value = serde_json::to_value(backend.build_request("hi", None)).unwrap();

        assert_eq!(value["model"], defaults::OPENAI_MODEL);
        assert_eq!(value["max_tokens"], 200);
        assert_eq!(value["messages"][0]["content"], "hi");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(
            value["response_format"]["json_schema"]["schema"]["properties"]["category"]["type"],
            "string"
        );
    }

    #[test]
    fn test_request_without_structured_output() {
        let backend = OpenAIBackend::new(OpenAIConfig {
            structured_output: false,
            ..Default::default()
        })
        .unwrap();
        let value = serde_json::to_value(backend.build_request("hi", None)).unwrap();
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_request_with_image_uses_data_url() {
        let backend = OpenAIBackend::new(OpenAIConfig::default()).unwrap();
        let image = ModelImage {
            data: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".to_string(),
        };
        let value = serde_json::to_value(backend.build_request("hi", Some(&image))).unwrap();
        let url = value["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}

//! Provider-neutral generation settings and the answer schema.

use serde_json::{json, Value};

use pocket_core::defaults;

/// Sampling and output settings for categorization calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: defaults::GEN_TEMPERATURE,
            top_k: defaults::GEN_TOP_K,
            top_p: defaults::GEN_TOP_P,
            max_output_tokens: defaults::GEN_MAX_OUTPUT_TOKENS,
        }
    }
}

/// JSON Schema of the model answer:
/// `{category, confidence, reasoning, alternatives[]}`, all required.
pub fn categorization_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": { "type": "string" },
            "confidence": { "type": "number" },
            "reasoning": { "type": "string" },
            "alternatives": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["category", "confidence", "reasoning", "alternatives"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.temperature, 0.3);
        assert_eq!(settings.top_k, 40);
        assert_eq!(settings.top_p, 0.95);
        assert_eq!(settings.max_output_tokens, 200);
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = categorization_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
        assert_eq!(schema["properties"]["alternatives"]["items"]["type"], "string");
    }
}

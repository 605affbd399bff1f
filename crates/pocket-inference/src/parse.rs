//! Parsing and validation of the model's categorization answer.

use serde_json::{Map, Value};

use pocket_core::{validate_galaxy_name, CategorizationResult, Error, Result};

/// Remove a surrounding Markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse the raw model text into a validated [`CategorizationResult`].
///
/// The answer must be a JSON object with a non-blank string `category`, a
/// numeric `confidence` within `[0, 1]` and a string `reasoning`.
/// `alternatives` is optional; when present it must be an array, and
/// entries that are not strings are dropped.
pub fn parse_categorization(text: &str) -> Result<CategorizationResult> {
    let value: Value = match serde_json::from_str(text.trim()) {
        Ok(v) => v,
        Err(_) => serde_json::from_str(strip_code_fences(text))
            .map_err(|e| Error::Inference(format!("Model answer is not JSON: {}", e)))?,
    };

    let obj = value
        .as_object()
        .ok_or_else(|| Error::Inference("Model answer is not a JSON object".to_string()))?;

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Inference("Model answer has no category".to_string()))?;

    let category = validate_galaxy_name(category)
        .map_err(|e| Error::Inference(format!("Model suggested an unusable folder: {}", e)))?;

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Inference("Model answer has no numeric confidence".to_string()))?;

    if !(0.0..=1.0).contains(&confidence) {
        return Err(Error::Inference(format!(
            "Model confidence {} is outside [0, 1]",
            confidence
        )));
    }

    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Inference("Model answer has no reasoning".to_string()))?;

    Ok(CategorizationResult {
        suggested_folder: category.to_string(),
        confidence,
        reasoning: reasoning.to_string(),
        alternatives: alternatives(obj)?,
    })
}

fn alternatives(obj: &Map<String, Value>) -> Result<Vec<String>> {
    match obj.get("alternatives") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
        Some(_) => Err(Error::Inference(
            "Model alternatives is not an array".to_string(),
        )),
    }
}

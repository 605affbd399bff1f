//! Folder suggestion on top of a [`GenerationBackend`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use pocket_core::{
    CategorizationResult, Error, GenerationBackend, ModelImage, ModelReply, Result,
    UserCorrection,
};

use crate::parse::parse_categorization;
use crate::prompt::{build_prompt, PromptInput, PromptSubject};

/// The caller's existing folders and recent corrections, fed into the prompt.
#[derive(Debug, Clone, Default)]
pub struct CategorizationContext {
    pub folders: Vec<String>,
    pub corrections: Vec<UserCorrection>,
}

/// Suggests a folder for a note or an image.
///
/// One model call per request. When the answer comes back empty, or cut
/// off by the output token cap and unparseable, a single second call is
/// made with a shortened prompt.
#[derive(Clone)]
pub struct Categorizer {
    backend: Arc<dyn GenerationBackend>,
}

impl Categorizer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    pub async fn categorize_text(
        &self,
        content: &str,
        context: &CategorizationContext,
    ) -> Result<CategorizationResult> {
        let input = PromptInput {
            subject: PromptSubject::Text(content),
            folders: &context.folders,
            corrections: &context.corrections,
        };
        self.run(input, None).await
    }

    pub async fn categorize_image(
        &self,
        image: &ModelImage,
        context: &CategorizationContext,
    ) -> Result<CategorizationResult> {
        let input = PromptInput {
            subject: PromptSubject::Image,
            folders: &context.folders,
            corrections: &context.corrections,
        };
        self.run(input, Some(image)).await
    }

    async fn run(
        &self,
        input: PromptInput<'_>,
        image: Option<&ModelImage>,
    ) -> Result<CategorizationResult> {
        let start = Instant::now();

        let first = self.call(&input, image, 1).await?;
        let retry_reason = if first.text.is_empty() {
            "empty"
        } else {
            match parse_categorization(&first.text) {
                Ok(result) => return Ok(self.finish(result, 1, start)),
                Err(e) if first.is_truncated() => {
                    debug!(
                        subsystem = "inference",
                        component = "categorizer",
                        error = %e,
                        "Truncated answer did not parse"
                    );
                    "truncated"
                }
                Err(e) => return Err(e),
            }
        };

        warn!(
            subsystem = "inference",
            component = "categorizer",
            model = %self.model_name(),
            finish_reason = first.finish_reason.as_deref().unwrap_or("none"),
            reason = retry_reason,
            "Retrying with shortened prompt"
        );

        let second = self.call(&input.shortened(), image, 2).await?;
        if second.text.is_empty() {
            return Err(Error::Inference(format!(
                "Model returned an empty response (finish reason: {})",
                second.finish_reason.as_deref().unwrap_or("none")
            )));
        }

        let result = parse_categorization(&second.text)?;
        Ok(self.finish(result, 2, start))
    }

    async fn call(
        &self,
        input: &PromptInput<'_>,
        image: Option<&ModelImage>,
        attempt: u32,
    ) -> Result<ModelReply> {
        let prompt = build_prompt(input);
        debug!(
            subsystem = "inference",
            component = "categorizer",
            attempt,
            prompt_len = prompt.len(),
            "Requesting folder suggestion"
        );
        self.backend.generate(&prompt, image).await
    }

    fn finish(
        &self,
        result: CategorizationResult,
        attempts: u32,
        start: Instant,
    ) -> CategorizationResult {
        info!(
            subsystem = "inference",
            component = "categorizer",
            model = %self.model_name(),
            attempts,
            folder = %result.suggested_folder,
            confidence = result.confidence,
            duration_ms = start.elapsed().as_millis() as u64,
            "Folder suggested"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerationBackend;

    const GOOD: &str =
        r#"{"category":"Groceries","confidence":0.9,"reasoning":"list","alternatives":["Food"]}"#;

    fn categorizer(mock: &MockGenerationBackend) -> Categorizer {
        Categorizer::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_first_answer_used() {
        let mock = MockGenerationBackend::new().with_reply(GOOD, Some("STOP"));
        let result = categorizer(&mock)
            .categorize_text("buy milk", &CategorizationContext::default())
            .await
            .unwrap();

        assert_eq!(result.suggested_folder, "Groceries");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_retries_with_short_prompt() {
        let mock = MockGenerationBackend::new()
            .with_reply("", Some("STOP"))
            .with_reply(GOOD, Some("STOP"));
        let context = CategorizationContext {
            folders: vec!["Work".to_string()],
            corrections: vec![UserCorrection {
                original_content: "meeting notes".to_string(),
                suggested_folder: "Work".to_string(),
                accepted_folder: "Meetings".to_string(),
            }],
        };
        let content = "z".repeat(3000);

        let result = categorizer(&mock)
            .categorize_text(&content, &context)
            .await
            .unwrap();
        assert_eq!(result.suggested_folder, "Groceries");

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].prompt.contains("past corrections"));
        assert!(!calls[1].prompt.contains("past corrections"));
        assert!(calls[1].prompt.contains(&"z".repeat(1000)));
        assert!(!calls[1].prompt.contains(&"z".repeat(1001)));
    }

    #[tokio::test]
    async fn test_truncated_answer_retries() {
        let mock = MockGenerationBackend::new()
            .with_reply(r#"{"category":"Gro"#, Some("MAX_TOKENS"))
            .with_reply(GOOD, Some("STOP"));
        let result = categorizer(&mock)
            .categorize_text("buy milk", &CategorizationContext::default())
            .await
            .unwrap();
        assert_eq!(result.suggested_folder, "Groceries");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_complete_answer_does_not_retry() {
        let mock = MockGenerationBackend::new()
            .with_reply(r#"{"category":"Work","confidence":7,"reasoning":"r"}"#, Some("STOP"));
        let err = categorizer(&mock)
            .categorize_text("buy milk", &CategorizationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_only_one_retry() {
        let mock = MockGenerationBackend::new()
            .with_reply("", Some("MAX_TOKENS"))
            .with_reply("", Some("MAX_TOKENS"))
            .with_reply(GOOD, Some("STOP"));
        let err = categorizer(&mock)
            .categorize_text("buy milk", &CategorizationContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty response"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_retried() {
        let mock = MockGenerationBackend::new().with_failure("upstream down");
        let err = categorizer(&mock)
            .categorize_text("buy milk", &CategorizationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_image_is_passed_to_backend() {
        let mock = MockGenerationBackend::new().with_reply(GOOD, None);
        let image = ModelImage {
            data: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
        };
        categorizer(&mock)
            .categorize_image(&image, &CategorizationContext::default())
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].image_mime_type.as_deref(), Some("image/png"));
        assert!(calls[0].prompt.starts_with("Analyze the attached image"));
    }
}

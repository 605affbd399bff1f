//! Mock generation backend for deterministic testing.
//!
//! Replies are served in the order they were queued; once the queue is
//! empty the default reply is returned. Every call is logged.
//!
//! ```text
//! use pocket_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .with_reply("", Some("MAX_TOKENS"))
//!     .with_default_reply(r#"{"category":"Work","confidence":0.8,"reasoning":"r"}"#);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pocket_core::{Error, GenerationBackend, ModelImage, ModelReply, Result};

/// A single recorded `generate` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub image_mime_type: Option<String>,
    pub image_len: usize,
}

#[derive(Debug)]
enum Scripted {
    Reply(ModelReply),
    Failure(String),
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Scripted>,
    default_reply: ModelReply,
    calls: Vec<MockCall>,
}

/// Mock generation backend for testing.
#[derive(Clone, Default)]
pub struct MockGenerationBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn with_reply(self, text: impl Into<String>, finish_reason: Option<&str>) -> Self {
        self.push(Scripted::Reply(ModelReply {
            text: text.into(),
            finish_reason: finish_reason.map(str::to_string),
        }));
        self
    }

    /// Queue a backend failure (returned as an inference error).
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Failure(message.into()));
        self
    }

    /// Reply used once the queue is drained.
    pub fn with_default_reply(self, text: impl Into<String>) -> Self {
        self.lock().default_reply = ModelReply {
            text: text.into(),
            finish_reason: Some("STOP".to_string()),
        };
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn push(&self, item: Scripted) {
        self.lock().queue.push_back(item);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str, image: Option<&ModelImage>) -> Result<ModelReply> {
        let mut state = self.lock();
        state.calls.push(MockCall {
            prompt: prompt.to_string(),
            image_mime_type: image.map(|i| i.mime_type.clone()),
            image_len: image.map(|i| i.data.len()).unwrap_or(0),
        });

        match state.queue.pop_front() {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Failure(message)) => Err(Error::Inference(message)),
            None => Ok(state.default_reply.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

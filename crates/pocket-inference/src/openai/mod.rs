//! OpenAI-compatible generation backend.
//!
//! Works with any endpoint that speaks `/chat/completions`: OpenAI itself,
//! Azure OpenAI, Ollama in compatibility mode, vLLM, LM Studio.
//!
//! ```text
//! use pocket_inference::openai::{OpenAIBackend, OpenAIConfig};
//!
//! let backend = OpenAIBackend::new(OpenAIConfig {
//!     base_url: "http://localhost:11434/v1".to_string(),
//!     gen_model: "llama3.2-vision".to_string(),
//!     ..Default::default()
//! })
//! .unwrap();
//! ```

mod backend;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use types::*;

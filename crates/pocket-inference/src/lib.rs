//! # pocket-inference
//!
//! Generative model integration for Pocket Universe folder suggestions.
//!
//! This crate provides:
//! - Gemini backend (default, feature `gemini`)
//! - OpenAI-compatible backend (feature `openai`)
//! - Prompt construction with folder and correction context
//! - Strict parsing and validation of the model's JSON answer
//! - [`Categorizer`], which ties the above together and retries once with a
//!   shortened prompt when the model returns nothing usable
//!
//! # Feature Flags
//!
//! - `gemini` (default): Enable the Gemini backend
//! - `openai`: Enable the OpenAI-compatible backend
//! - `mock`: Expose [`mock::MockGenerationBackend`] to dependent crates
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pocket_inference::{Categorizer, CategorizationContext, GeminiBackend};
//!
//! # async fn example() -> pocket_inference::Result<()> {
//! let backend = GeminiBackend::from_env()?;
//! let categorizer = Categorizer::new(Arc::new(backend));
//! let result = categorizer
//!     .categorize_text("buy milk", &CategorizationContext::default())
//!     .await?;
//! println!("{} ({:.2})", result.suggested_folder, result.confidence);
//! # Ok(())
//! # }
//! ```

pub mod categorizer;
pub mod generation;
pub mod parse;
pub mod prompt;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use pocket_core::*;

pub use categorizer::{CategorizationContext, Categorizer};
pub use generation::{categorization_schema, GenerationSettings};
pub use parse::{parse_categorization, strip_code_fences};
pub use prompt::{build_prompt, PromptInput, PromptSubject};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiBackend, GeminiConfig};

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

//! # pocket-core
//!
//! Core types, traits, and abstractions for Pocket Universe.
//!
//! This crate provides the domain model (galaxies, planets, images,
//! categorization records), the repository and model-backend traits the
//! other crates implement, and the shared helpers for content and media
//! normalization.

pub mod content;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod media;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use content::{clip_chars, image_preview, normalize_content, normalize_preview, slugify};
pub use error::{Error, Result};
pub use media::{
    build_object_key, extension_for, is_allowed_image_type, normalize_image_type,
    resolve_image_type, sniff_image_type,
};
pub use models::*;
pub use traits::*;

/// Generate a new time-ordered UUIDv7 identifier.
pub fn new_v7() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

//! Centralized default constants for Pocket Universe.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// CONTENT
// =============================================================================

/// Minimum characters accepted for a text categorization request.
pub const CONTENT_MIN_CHARS: usize = 3;

/// Maximum characters accepted for a text categorization request.
pub const CONTENT_MAX_CHARS: usize = 50_000;

/// Stored note content is trimmed and capped at this many characters.
pub const CONTENT_STORED_CHARS: usize = 4_000;

/// Length of the normalized preview kept on categorization records.
pub const PREVIEW_CHARS: usize = 500;

/// Characters of a past correction's preview quoted back into prompts.
pub const CORRECTION_QUOTE_CHARS: usize = 50;

// =============================================================================
// CATEGORIZATION CONTEXT
// =============================================================================

/// Existing folder names fed into the categorization prompt.
pub const FOLDER_CONTEXT_LIMIT: i64 = 100;

/// Recent accepted categorization records scanned for user overrides.
pub const CORRECTION_CONTEXT_LIMIT: i64 = 50;

/// Content length used by the shortened retry prompt.
pub const RETRY_CONTENT_CHARS: usize = 1_000;

/// Folder names kept by the shortened retry prompt.
pub const RETRY_FOLDER_LIMIT: usize = 20;

// =============================================================================
// GENERATION
// =============================================================================

/// Default Gemini model.
pub const GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

/// Default Gemini REST endpoint.
pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default OpenAI-compatible endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI-compatible generation model.
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature for categorization.
pub const GEN_TEMPERATURE: f32 = 0.3;

/// Top-k sampling for categorization.
pub const GEN_TOP_K: u32 = 40;

/// Nucleus sampling for categorization.
pub const GEN_TOP_P: f32 = 0.95;

/// Output token cap for categorization answers.
pub const GEN_MAX_OUTPUT_TOKENS: u32 = 200;

/// Model request timeout in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// IMAGES & STORAGE
// =============================================================================

/// Largest accepted image upload in bytes (6 MiB).
pub const MAX_IMAGE_BYTES: usize = 6 * 1024 * 1024;

/// Image MIME types accepted for upload and categorization.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Default object storage bucket for user images.
pub const IMAGE_BUCKET: &str = "user-images";

/// Lifetime of signed image URLs in seconds.
pub const SIGNED_URL_TTL_SECS: u64 = 60 * 60;

/// Cache-Control max-age sent with uploaded objects.
pub const OBJECT_CACHE_SECS: u64 = 3600;

/// Remote image fetch timeout in seconds.
pub const IMAGE_FETCH_TIMEOUT_SECS: u64 = 20;

/// Default local directory for the filesystem storage backend.
pub const STORAGE_PATH: &str = "./data/objects";

// =============================================================================
// DASHBOARD
// =============================================================================

/// Name of the virtual folder collecting planets without a galaxy.
pub const ORPHANED_GALAXY_NAME: &str = "Orphaned Planets";

/// Longest accepted galaxy name.
pub const GALAXY_NAME_MAX_CHARS: usize = 100;

// =============================================================================
// AUTH
// =============================================================================

/// Session cookie name.
pub const SESSION_COOKIE: &str = "pocket_session";

/// Default session lifetime in hours (30 days).
pub const SESSION_TTL_HOURS: i64 = 720;

/// Random characters in an issued session token (after the prefix).
pub const SESSION_TOKEN_LEN: usize = 48;

/// Prefix for issued session tokens.
pub const SESSION_TOKEN_PREFIX: &str = "pu_sess_";

/// Password length bounds.
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 128;

/// Display name length bound.
pub const NAME_MAX_CHARS: usize = 100;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Request body limit: a 6 MiB image expands to ~8 MiB as base64.
pub const BODY_LIMIT_BYTES: usize = 9 * 1024 * 1024;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_limits_are_ordered() {
        assert!(CONTENT_MIN_CHARS < CONTENT_STORED_CHARS);
        assert!(CONTENT_STORED_CHARS < CONTENT_MAX_CHARS);
        assert!(PREVIEW_CHARS < CONTENT_STORED_CHARS);
    }

    #[test]
    fn test_body_limit_fits_base64_image() {
        // base64 expands by 4/3
        assert!(BODY_LIMIT_BYTES > MAX_IMAGE_BYTES * 4 / 3);
    }

    #[test]
    fn test_allowed_image_types() {
        assert!(ALLOWED_IMAGE_TYPES.contains(&"image/jpeg"));
        assert!(ALLOWED_IMAGE_TYPES.contains(&"image/png"));
        assert!(ALLOWED_IMAGE_TYPES.contains(&"image/webp"));
        assert!(!ALLOWED_IMAGE_TYPES.contains(&"image/jpg"));
    }
}

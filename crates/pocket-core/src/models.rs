//! Domain models for Pocket Universe.
//!
//! Wire names are camelCase to match the JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// USERS & SESSIONS
// =============================================================================

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at_utc: DateTime<Utc>,
}

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// A live login session. The opaque token itself is only held by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub expires_at_utc: DateTime<Utc>,
}

/// A freshly issued session together with its plaintext token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

// =============================================================================
// GALAXIES, PLANETS, IMAGES
// =============================================================================

/// A user-defined folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Galaxy {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub shareable: bool,
    pub created_at_utc: DateTime<Utc>,
}

/// A text note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Planet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Metadata for an uploaded picture. The bytes live in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bucket: String,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    pub is_public: bool,
    pub created_at_utc: DateTime<Utc>,
}

/// Fields required to persist an uploaded image.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub user_id: Uuid,
    pub bucket: String,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    pub is_public: bool,
}

/// Planet row as shown inside a dashboard folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetSummary {
    pub id: Uuid,
    pub content: String,
    pub created_at_utc: DateTime<Utc>,
}

/// Image row as shown inside a dashboard folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: Uuid,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at_utc: DateTime<Utc>,
    /// Filled in by the API layer when a storage backend is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
}

/// A dashboard folder with its contents.
///
/// The virtual "Orphaned Planets" folder has no id and `is_virtual = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalaxyContents {
    pub id: Option<Uuid>,
    pub name: String,
    pub shareable: bool,
    pub is_virtual: bool,
    pub created_at_utc: Option<DateTime<Utc>>,
    pub planets: Vec<PlanetSummary>,
    pub images: Vec<ImageSummary>,
    pub planet_count: i64,
    pub image_count: i64,
}

impl GalaxyContents {
    /// Build the virtual folder for items that belong to no galaxy.
    pub fn orphaned(planets: Vec<PlanetSummary>, images: Vec<ImageSummary>) -> Self {
        Self {
            id: None,
            name: crate::defaults::ORPHANED_GALAXY_NAME.to_string(),
            shareable: false,
            is_virtual: true,
            created_at_utc: None,
            planet_count: planets.len() as i64,
            image_count: images.len() as i64,
            planets,
            images,
        }
    }
}

/// True for the reserved virtual folder name (case-insensitive).
pub fn is_reserved_galaxy_name(name: &str) -> bool {
    name.trim()
        .eq_ignore_ascii_case(crate::defaults::ORPHANED_GALAXY_NAME)
}

/// Validate a galaxy name and return it trimmed.
///
/// Names must be non-empty, at most `GALAXY_NAME_MAX_CHARS` characters, and
/// must not collide with the virtual orphaned folder.
pub fn validate_galaxy_name(name: &str) -> crate::Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::InvalidInput("Missing galaxy".to_string()));
    }
    if trimmed.chars().count() > crate::defaults::GALAXY_NAME_MAX_CHARS {
        return Err(crate::Error::InvalidInput(format!(
            "Galaxy name exceeds {} characters",
            crate::defaults::GALAXY_NAME_MAX_CHARS
        )));
    }
    if is_reserved_galaxy_name(trimmed) {
        return Err(crate::Error::InvalidInput(format!(
            "\"{}\" is reserved",
            crate::defaults::ORPHANED_GALAXY_NAME
        )));
    }
    Ok(trimmed)
}

// =============================================================================
// CATEGORIZATION
// =============================================================================

/// Validated answer from the categorization model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationResult {
    pub suggested_folder: String,
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<String>,
}

/// A past suggestion the user overrode, quoted back into prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCorrection {
    pub original_content: String,
    pub suggested_folder: String,
    pub accepted_folder: String,
}

/// Stored audit/feedback record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCategorization {
    pub id: Uuid,
    pub user_id: Uuid,
    pub planet_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub content_preview: String,
    pub suggested_folder: String,
    pub accepted_folder: Option<String>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
    pub alternatives: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
}

/// Fields of a categorization record to be written.
#[derive(Debug, Clone)]
pub struct NewCategorization {
    pub user_id: Uuid,
    pub planet_id: Option<Uuid>,
    pub folder_id: Uuid,
    pub content_preview: String,
    pub suggested_folder: String,
    pub accepted_folder: String,
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<String>,
}

/// Which write strategy persisted a categorization record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteTier {
    /// Full typed insert against the migrated schema.
    Typed,
    /// Typed insert of the minimal required fields.
    Minimal,
    /// Insert built from the live column set.
    Adaptive,
}

impl std::fmt::Display for WriteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteTier::Typed => "typed",
            WriteTier::Minimal => "minimal",
            WriteTier::Adaptive => "adaptive",
        };
        f.write_str(s)
    }
}

/// Outcome of the best-effort audit write.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationWrite {
    pub review_id: Option<Uuid>,
    pub tier: Option<WriteTier>,
}

impl CategorizationWrite {
    pub fn saved(&self) -> bool {
        self.tier.is_some()
    }
}

// =============================================================================
// MODEL I/O
// =============================================================================

/// Image handed to a generative model alongside the prompt.
#[derive(Debug, Clone)]
pub struct ModelImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Raw model answer before parsing.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    /// Provider finish reason, e.g. "STOP", "MAX_TOKENS", "length".
    pub finish_reason: Option<String>,
}

impl ModelReply {
    /// True when the model stopped on its output token cap.
    pub fn is_truncated(&self) -> bool {
        matches!(
            self.finish_reason.as_deref(),
            Some("MAX_TOKENS") | Some("length")
        )
    }
}

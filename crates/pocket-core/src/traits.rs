//! Core traits for Pocket Universe abstractions.
//!
//! Repositories are implemented over PostgreSQL in `pocket-db`; generation
//! backends are implemented in `pocket-inference`. Handlers only see these
//! traits, which keeps them testable without a database or a live model.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ACCOUNT TRAITS
// =============================================================================

/// Repository for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Returns `Error::Conflict` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<Uuid>;

    /// Look up a user by id.
    async fn get(&self, id: Uuid) -> Result<Option<User>>;

    /// Look up a user by (lowercased) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by display name. Returns the oldest match.
    async fn find_by_name(&self, name: &str) -> Result<Option<User>>;
}

/// Repository for login sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Issue a new session for the user, valid for `ttl_hours`.
    async fn create(&self, user_id: Uuid, ttl_hours: i64) -> Result<IssuedSession>;

    /// Resolve a plaintext token to an unexpired session.
    async fn validate(&self, token: &str) -> Result<Option<Session>>;

    /// Revoke a session by its plaintext token. Unknown tokens are a no-op.
    async fn revoke(&self, token: &str) -> Result<()>;

    /// Remove expired sessions. Returns the number deleted.
    async fn purge_expired(&self) -> Result<u64>;
}

// =============================================================================
// FOLDER & CONTENT TRAITS
// =============================================================================

/// Repository for galaxies (folders).
#[async_trait]
pub trait GalaxyRepository: Send + Sync {
    /// Find the user's galaxy with this exact (trimmed) name, creating it if
    /// missing. Concurrent callers converge on a single row.
    async fn find_or_create(&self, user_id: Uuid, name: &str) -> Result<Galaxy>;

    /// Find a galaxy by exact (trimmed) name.
    async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Galaxy>>;

    /// Get a galaxy owned by the user.
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Galaxy>>;

    /// List the user's galaxies, oldest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Galaxy>>;

    /// Galaxy names for prompt context, oldest first, at most `limit`.
    async fn list_names(&self, user_id: Uuid, limit: i64) -> Result<Vec<String>>;

    /// Galaxies with their planets and images, newest first, followed by the
    /// virtual orphaned folder when any planet or image has no galaxy.
    async fn list_with_contents(&self, user_id: Uuid) -> Result<Vec<GalaxyContents>>;

    /// Rename a galaxy. `Error::Conflict` on a duplicate name.
    async fn rename(&self, user_id: Uuid, id: Uuid, name: &str) -> Result<Galaxy>;

    /// Delete a galaxy and its links. Planets and images survive.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()>;

    /// Delete those of the given galaxies that hold no planets and no images.
    async fn delete_if_empty(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64>;
}

/// Repository for planets (notes).
#[async_trait]
pub trait PlanetRepository: Send + Sync {
    /// Create a planet, optionally linked to a galaxy, in one transaction.
    async fn create(&self, user_id: Uuid, content: &str, galaxy_id: Option<Uuid>)
        -> Result<Planet>;

    /// Get a planet owned by the user.
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Planet>>;

    /// Replace a planet's content.
    async fn update_content(&self, user_id: Uuid, id: Uuid, content: &str) -> Result<Planet>;

    /// Delete a planet, then drop galaxies it left empty.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()>;

    /// Move a planet into the named galaxy (find-or-create), disconnecting it
    /// from every other galaxy and dropping galaxies left empty.
    async fn attach_to_galaxy(&self, user_id: Uuid, id: Uuid, galaxy_name: &str)
        -> Result<Galaxy>;

    /// Planets linked to no galaxy, newest first.
    async fn list_orphans(&self, user_id: Uuid) -> Result<Vec<PlanetSummary>>;
}

/// Repository for image metadata.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert image metadata, optionally linked to a galaxy.
    async fn create(&self, image: NewImage, galaxy_id: Option<Uuid>) -> Result<Image>;

    /// Get an image owned by the user.
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Image>>;

    /// Delete image metadata, then drop galaxies it left empty. Returns the
    /// deleted row so the caller can remove the stored object.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Image>;

    /// Move an image into the named galaxy, with the same rules as planets.
    async fn attach_to_galaxy(&self, user_id: Uuid, id: Uuid, galaxy_name: &str)
        -> Result<Galaxy>;
}

/// Repository for categorization audit records.
#[async_trait]
pub trait CategorizationRepository: Send + Sync {
    /// Recent records whose accepted folder differs from the suggestion,
    /// scanning at most `limit` accepted rows.
    async fn recent_corrections(&self, user_id: Uuid, limit: i64)
        -> Result<Vec<UserCorrection>>;

    /// Best-effort write through progressively simpler strategies.
    /// Never fails; the outcome reports which strategy succeeded, if any.
    async fn record(&self, record: NewCategorization) -> CategorizationWrite;

    /// Set `accepted_folder` on the newest record for the planet.
    /// Returns whether a row was updated.
    async fn mark_accepted(&self, user_id: Uuid, planet_id: Uuid, folder_name: &str)
        -> Result<bool>;
}

// =============================================================================
// MODEL BACKEND TRAITS
// =============================================================================

/// Backend for structured text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a reply to the prompt, optionally looking at one image.
    async fn generate(&self, prompt: &str, image: Option<&ModelImage>) -> Result<ModelReply>;

    /// Model identifier used for generation.
    fn model_name(&self) -> &str;

    /// Check that the backend is reachable and configured.
    async fn health_check(&self) -> Result<bool>;
}

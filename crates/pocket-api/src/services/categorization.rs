//! The categorization workflow behind `POST /api/ai/pipeline`.
//!
//! Gather context, ask the model, find-or-create the suggested galaxy,
//! store the note or image in it, then write the audit record. The audit
//! write is best-effort and never fails the request.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use pocket_core::{
    defaults, image_preview, normalize_content, normalize_preview, CategorizationRepository,
    CategorizationResult, CategorizationWrite, Error, Galaxy, GalaxyRepository, NewCategorization,
    PlanetRepository, Result,
};
use pocket_inference::CategorizationContext;

use crate::services::image_intake::{store_image, IncomingImage};
use crate::AppState;

/// Response of the pipeline endpoint. Text submissions carry `planetId`,
/// image submissions `imageId`, `objectKey` and `signedUrl`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub folder_id: Uuid,
    pub folder_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planet_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
    pub review_id: Option<Uuid>,
    pub suggested_folder: String,
    pub confidence: f64,
    pub alternatives: Vec<String>,
    pub reasoning: String,
    pub ai_categorization_saved: bool,
}

impl PipelineResponse {
    fn new(folder_id: Uuid, result: CategorizationResult, write: &CategorizationWrite) -> Self {
        Self {
            folder_id,
            folder_name: result.suggested_folder.clone(),
            planet_id: None,
            image_id: None,
            object_key: None,
            signed_url: None,
            review_id: write.review_id,
            suggested_folder: result.suggested_folder,
            confidence: result.confidence,
            alternatives: result.alternatives,
            reasoning: result.reasoning,
            ai_categorization_saved: write.saved(),
        }
    }
}

/// Check raw note text against the accepted length range.
///
/// The lower bound applies to the trimmed text, the upper bound to what
/// was sent.
pub fn validate_content(raw: &str) -> Result<String> {
    if raw.chars().count() > defaults::CONTENT_MAX_CHARS {
        return Err(Error::InvalidInput(format!(
            "Invalid request: content exceeds {} characters",
            defaults::CONTENT_MAX_CHARS
        )));
    }
    if raw.trim().chars().count() < defaults::CONTENT_MIN_CHARS {
        return Err(Error::InvalidInput(format!(
            "Invalid request: content must be at least {} characters",
            defaults::CONTENT_MIN_CHARS
        )));
    }
    Ok(normalize_content(raw))
}

/// Existing galaxy names and recent overrides for the prompt.
///
/// A failing correction lookup only costs prompt quality, so it is logged
/// and skipped.
pub async fn load_context(state: &AppState, user_id: Uuid) -> Result<CategorizationContext> {
    let folders = state
        .db
        .galaxies
        .list_names(user_id, defaults::FOLDER_CONTEXT_LIMIT)
        .await?;

    let corrections = match state
        .db
        .categorizations
        .recent_corrections(user_id, defaults::CORRECTION_CONTEXT_LIMIT)
        .await
    {
        Ok(corrections) => corrections,
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "categorization",
                user_id = %user_id,
                error = %e,
                "Correction lookup failed, continuing without corrections"
            );
            Vec::new()
        }
    };

    Ok(CategorizationContext {
        folders,
        corrections,
    })
}

/// Find-or-create a galaxy, reporting whether this call created it.
pub async fn resolve_galaxy(
    state: &AppState,
    user_id: Uuid,
    name: &str,
) -> Result<(Galaxy, bool)> {
    if let Some(existing) = state.db.galaxies.find_by_name(user_id, name).await? {
        return Ok((existing, false));
    }
    let galaxy = state.db.galaxies.find_or_create(user_id, name).await?;
    Ok((galaxy, true))
}

/// Undo a galaxy created for an item that could not be stored, so a failed
/// request does not leave an empty galaxy behind. Galaxies that already
/// existed are left alone.
pub async fn release_new_galaxy(
    state: &AppState,
    user_id: Uuid,
    galaxy: &Galaxy,
    created: bool,
) {
    if !created {
        return;
    }
    if let Err(e) = state.db.galaxies.delete_if_empty(user_id, &[galaxy.id]).await {
        warn!(
            subsystem = "api",
            component = "categorization",
            user_id = %user_id,
            galaxy_id = %galaxy.id,
            error = %e,
            "Failed to remove galaxy after store failure"
        );
    }
}

/// Categorize and store a note. `content` must already be normalized.
pub async fn categorize_text(
    state: &AppState,
    user_id: Uuid,
    content: &str,
) -> Result<PipelineResponse> {
    let start = Instant::now();
    let context = load_context(state, user_id).await?;
    let result = state.categorizer.categorize_text(content, &context).await?;

    let (galaxy, created) = resolve_galaxy(state, user_id, &result.suggested_folder).await?;
    let planet = match state
        .db
        .planets
        .create(user_id, content, Some(galaxy.id))
        .await
    {
        Ok(planet) => planet,
        Err(e) => {
            release_new_galaxy(state, user_id, &galaxy, created).await;
            return Err(e);
        }
    };

    let write = state
        .db
        .categorizations
        .record(NewCategorization {
            user_id,
            planet_id: Some(planet.id),
            folder_id: galaxy.id,
            content_preview: normalize_preview(content),
            suggested_folder: result.suggested_folder.clone(),
            accepted_folder: result.suggested_folder.clone(),
            confidence: result.confidence,
            reasoning: result.reasoning.clone(),
            alternatives: result.alternatives.clone(),
        })
        .await;

    info!(
        subsystem = "api",
        component = "categorization",
        op = "categorize_text",
        user_id = %user_id,
        galaxy_id = %galaxy.id,
        planet_id = %planet.id,
        audit_saved = write.saved(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Note categorized"
    );

    let mut response = PipelineResponse::new(galaxy.id, result, &write);
    response.folder_name = galaxy.name;
    response.planet_id = Some(planet.id);
    Ok(response)
}

/// Categorize and store an image.
pub async fn categorize_image(
    state: &AppState,
    user_id: Uuid,
    incoming: &IncomingImage,
) -> Result<PipelineResponse> {
    let start = Instant::now();
    let context = load_context(state, user_id).await?;
    let result = state
        .categorizer
        .categorize_image(&incoming.to_model_image(), &context)
        .await?;

    let (galaxy, created) = resolve_galaxy(state, user_id, &result.suggested_folder).await?;
    let stored = match store_image(state, user_id, &galaxy, incoming).await {
        Ok(stored) => stored,
        Err(e) => {
            release_new_galaxy(state, user_id, &galaxy, created).await;
            return Err(e);
        }
    };

    // Image records have no planet; the preview names the object instead.
    let write = state
        .db
        .categorizations
        .record(NewCategorization {
            user_id,
            planet_id: None,
            folder_id: galaxy.id,
            content_preview: image_preview(&stored.image.object_key),
            suggested_folder: result.suggested_folder.clone(),
            accepted_folder: result.suggested_folder.clone(),
            confidence: result.confidence,
            reasoning: result.reasoning.clone(),
            alternatives: result.alternatives.clone(),
        })
        .await;

    info!(
        subsystem = "api",
        component = "categorization",
        op = "categorize_image",
        user_id = %user_id,
        galaxy_id = %galaxy.id,
        image_id = %stored.image.id,
        audit_saved = write.saved(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Image categorized"
    );

    let mut response = PipelineResponse::new(galaxy.id, result, &write);
    response.folder_name = galaxy.name;
    response.image_id = Some(stored.image.id);
    response.object_key = Some(stored.image.object_key);
    response.signed_url = stored.signed_url;
    Ok(response)
}

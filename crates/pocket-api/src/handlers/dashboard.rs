//! Dashboard handlers: browse, move, edit, and delete the caller's items.
//!
//! Moves and deletes drop galaxies left with no planets and no images.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use pocket_core::{
    validate_galaxy_name, CategorizationRepository, Galaxy, GalaxyContents, GalaxyRepository,
    ImageRepository, PlanetRepository,
};

use crate::auth::RequireSession;
use crate::services::categorization::validate_content;
use crate::services::image_intake::signed_url_for;
use crate::{ApiError, AppState};

/// Every galaxy with its planets and images, newest first, plus the virtual
/// orphaned folder when something belongs nowhere.
pub async fn get_dashboard(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
) -> Result<Json<Vec<GalaxyContents>>, ApiError> {
    let mut galaxies = state.db.galaxies.list_with_contents(user.id).await?;

    for galaxy in &mut galaxies {
        for image in &mut galaxy.images {
            image.signed_url = signed_url_for(&state, &image.object_key).await;
        }
    }

    Ok(Json(galaxies))
}

/// Flat list of the caller's galaxies.
pub async fn fetch_planets(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
) -> Result<Json<Vec<Galaxy>>, ApiError> {
    Ok(Json(state.db.galaxies.list(user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DashboardAction {
    #[serde(rename_all = "camelCase")]
    AttachPlanetToFolder { planet_id: Uuid, folder_name: String },
    #[serde(rename_all = "camelCase")]
    AttachImageToFolder { image_id: Uuid, folder_name: String },
    CreateGalaxy { name: String },
}

pub async fn post_dashboard(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    body: Result<Json<DashboardAction>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(action) = body?;

    match action {
        DashboardAction::AttachPlanetToFolder {
            planet_id,
            folder_name,
        } => {
            let name = validate_galaxy_name(&folder_name)?;
            let galaxy = state
                .db
                .planets
                .attach_to_galaxy(user.id, planet_id, name)
                .await?;

            // Feeds the correction history used in later prompts.
            match state
                .db
                .categorizations
                .mark_accepted(user.id, planet_id, &galaxy.name)
                .await
            {
                Ok(updated) => info!(
                    subsystem = "api",
                    component = "dashboard",
                    user_id = %user.id,
                    planet_id = %planet_id,
                    galaxy_id = %galaxy.id,
                    feedback_recorded = updated,
                    "Planet moved"
                ),
                Err(e) => warn!(
                    subsystem = "api",
                    component = "dashboard",
                    planet_id = %planet_id,
                    error = %e,
                    "Failed to record accepted folder"
                ),
            }

            Ok(Json(json!({ "success": true, "galaxy": galaxy })).into_response())
        }
        DashboardAction::AttachImageToFolder {
            image_id,
            folder_name,
        } => {
            let name = validate_galaxy_name(&folder_name)?;
            let galaxy = state
                .db
                .images
                .attach_to_galaxy(user.id, image_id, name)
                .await?;
            info!(
                subsystem = "api",
                component = "dashboard",
                user_id = %user.id,
                image_id = %image_id,
                galaxy_id = %galaxy.id,
                "Image moved"
            );
            Ok(Json(json!({ "success": true, "galaxy": galaxy })).into_response())
        }
        DashboardAction::CreateGalaxy { name } => {
            let name = validate_galaxy_name(&name)?;
            let galaxy = state.db.galaxies.find_or_create(user.id, name).await?;
            Ok((StatusCode::CREATED, Json(galaxy)).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DashboardUpdate {
    #[serde(rename_all = "camelCase")]
    Planet { id: Uuid, updated_data: String },
    #[serde(rename_all = "camelCase")]
    Galaxy { id: Uuid, updated_data: String },
}

pub async fn put_dashboard(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    body: Result<Json<DashboardUpdate>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(update) = body?;

    match update {
        DashboardUpdate::Planet { id, updated_data } => {
            let content = validate_content(&updated_data)?;
            let planet = state.db.planets.update_content(user.id, id, &content).await?;
            Ok(Json(planet).into_response())
        }
        DashboardUpdate::Galaxy { id, updated_data } => {
            let name = validate_galaxy_name(&updated_data)?;
            let galaxy = state.db.galaxies.rename(user.id, id, name).await?;
            Ok(Json(galaxy).into_response())
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Planet,
    Image,
    Galaxy,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: Uuid,
}

pub async fn delete_dashboard(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;

    match req.item_type {
        ItemType::Planet => state.db.planets.delete(user.id, req.id).await?,
        ItemType::Galaxy => state.db.galaxies.delete(user.id, req.id).await?,
        ItemType::Image => {
            let image = state.db.images.delete(user.id, req.id).await?;
            // The row is gone; a leftover object is only wasted space.
            if let Err(e) = state.storage.delete(&image.object_key).await {
                warn!(
                    subsystem = "api",
                    component = "dashboard",
                    image_id = %image.id,
                    object_key = %image.object_key,
                    error = %e,
                    "Failed to delete stored object"
                );
            }
        }
    }

    info!(
        subsystem = "api",
        component = "dashboard",
        user_id = %user.id,
        item_type = ?req.item_type,
        item_id = %req.id,
        "Item deleted"
    );
    Ok(Json(json!({ "success": true })))
}

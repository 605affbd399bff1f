//! Playground handlers: direct galaxy, planet, and image creation without
//! the model in the loop.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pocket_core::{validate_galaxy_name, Galaxy, GalaxyRepository, Planet, PlanetRepository};

use crate::auth::RequireSession;
use crate::services::categorization::{release_new_galaxy, resolve_galaxy, validate_content};
use crate::services::image_intake::{
    decode_payload, store_image, ImagePayload, IncomingImage, StoredImage,
};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct GalaxyCheckRequest {
    pub galaxy: Option<String>,
}

/// Find the caller's galaxy by name, creating it if needed.
pub async fn galaxy_check(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    body: Result<Json<GalaxyCheckRequest>, JsonRejection>,
) -> Result<Json<Galaxy>, ApiError> {
    let Json(req) = body?;
    let name = validate_galaxy_name(req.galaxy.as_deref().unwrap_or_default())?;
    Ok(Json(state.db.galaxies.find_or_create(user.id, name).await?))
}

#[derive(Debug, Deserialize)]
pub struct PlanetCreateRequest {
    pub planet: Option<String>,
    pub galaxy: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetCreated {
    #[serde(flatten)]
    pub planet: Planet,
    pub galaxy_id: Option<Uuid>,
}

/// Create a planet, optionally inside a (found or created) galaxy.
pub async fn planet_create(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    body: Result<Json<PlanetCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let Some(raw) = req.planet else {
        return Err(ApiError::BadRequest("Missing planet".to_string()));
    };
    let content = validate_content(&raw)?;

    let galaxy_id = match req.galaxy.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        Some(name) => {
            let name = validate_galaxy_name(name)?;
            Some(state.db.galaxies.find_or_create(user.id, name).await?.id)
        }
        None => None,
    };

    let planet = state.db.planets.create(user.id, &content, galaxy_id).await?;
    Ok((StatusCode::CREATED, Json(PlanetCreated { planet, galaxy_id })))
}

#[derive(Debug, Deserialize)]
pub struct ImgStorageRequest {
    pub img: Option<ImagePayload>,
    pub galaxy: Option<String>,
}

/// Store an image in a galaxy. Accepts JSON `{img, galaxy}` or a multipart
/// form with `file` and `galaxy` fields.
pub async fn img_storage(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    request: Request,
) -> Result<Json<StoredImage>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (incoming, galaxy_name) = if is_multipart {
        let multipart = Multipart::from_request(request, &state).await?;
        read_multipart(multipart).await?
    } else {
        let Json(req) = Json::<ImgStorageRequest>::from_request(request, &state).await?;
        let Some(payload) = req.img.filter(|p| !p.is_empty()) else {
            return Err(ApiError::BadRequest("No img".to_string()));
        };
        let galaxy = required_galaxy(req.galaxy)?;
        (decode_payload(&state.http, &payload).await?, galaxy)
    };

    let name = validate_galaxy_name(&galaxy_name)?;
    let (galaxy, created) = resolve_galaxy(&state, user.id, name).await?;
    match store_image(&state, user.id, &galaxy, &incoming).await {
        Ok(stored) => Ok(Json(stored)),
        Err(e) => {
            release_new_galaxy(&state, user.id, &galaxy, created).await;
            Err(e.into())
        }
    }
}

fn required_galaxy(galaxy: Option<String>) -> Result<String, ApiError> {
    galaxy
        .filter(|g| !g.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing galaxy".to_string()))
}

async fn read_multipart(mut multipart: Multipart) -> Result<(IncomingImage, String), ApiError> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut galaxy: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid form: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid form: {}", e)))?;
                file = Some((data.to_vec(), content_type));
            }
            Some("galaxy") => {
                galaxy = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Invalid form: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let Some((data, content_type)) = file else {
        return Err(ApiError::BadRequest("No file".to_string()));
    };
    let galaxy = required_galaxy(galaxy)?;
    Ok((IncomingImage::validate(data, &content_type)?, galaxy))
}

//! Image URL refresh and signed downloads from filesystem storage.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use pocket_core::{defaults, sniff_image_type, ImageRepository};
use pocket_db::StorageBackend;

use crate::auth::RequireSession;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub id: Uuid,
    pub signed_url: String,
    pub expires_in: u64,
}

/// Issue a fresh signed URL for one of the caller's images.
pub async fn refresh_url(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    Path(id): Path<Uuid>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    let image = state
        .db
        .images
        .get(user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    let signed_url = state
        .storage
        .signed_url(&image.object_key, defaults::SIGNED_URL_TTL_SECS)
        .await?;

    Ok(Json(SignedUrlResponse {
        id: image.id,
        signed_url,
        expires_in: defaults::SIGNED_URL_TTL_SECS,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    pub expires: Option<i64>,
    pub sig: Option<String>,
}

/// Serve an object from filesystem storage. The query string must carry a
/// valid, unexpired signature; no session is needed.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignatureQuery>,
) -> Result<Response, ApiError> {
    let Some(local) = state.local_storage.as_ref() else {
        return Err(ApiError::NotFound("Not found".to_string()));
    };

    let (Some(expires), Some(sig)) = (query.expires, query.sig.as_deref()) else {
        return Err(ApiError::Unauthorized("Missing signature".to_string()));
    };
    if !local.verify(&key, expires, sig) {
        debug!(
            subsystem = "api",
            component = "storage",
            object_key = %key,
            "Rejected download signature"
        );
        return Err(ApiError::Unauthorized(
            "Invalid or expired signature".to_string(),
        ));
    }

    let data = local.get(&key).await?;
    let content_type = sniff_image_type(&data).unwrap_or("application/octet-stream");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CACHE_CONTROL,
            format!("private, max-age={}", defaults::OBJECT_CACHE_SECS),
        )
        .body(Body::from(data))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

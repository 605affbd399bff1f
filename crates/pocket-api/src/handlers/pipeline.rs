//! `POST /api/ai/pipeline`: categorize a note or an image and file it.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::auth::RequireSession;
use crate::services::categorization::{self, validate_content, PipelineResponse};
use crate::services::image_intake::{decode_payload, ImagePayload};
use crate::{ApiError, AppState};

/// Either `content` (a note) or `image`. An image wins when both are sent.
#[derive(Debug, Deserialize)]
pub struct PipelineRequest {
    pub content: Option<String>,
    pub image: Option<ImagePayload>,
}

pub async fn run_pipeline(
    State(state): State<AppState>,
    RequireSession { user, .. }: RequireSession,
    body: Result<Json<PipelineRequest>, JsonRejection>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let Json(req) = body?;

    if let Some(payload) = req.image.filter(|p| !p.is_empty()) {
        let incoming = decode_payload(&state.http, &payload).await?;
        let response = categorization::categorize_image(&state, user.id, &incoming).await?;
        return Ok(Json(response));
    }

    let Some(raw) = req.content else {
        return Err(ApiError::BadRequest(
            "Invalid request: provide content or image".to_string(),
        ));
    };
    let content = validate_content(&raw)?;
    let response = categorization::categorize_text(&state, user.id, &content).await?;
    Ok(Json(response))
}

//! Registration access by access identifier.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;

use super::error::ApiError;
use super::AppState;
use crate::domain::{AccessId, EventRegistration, RegistrationPatch};

/// `GET /api/email-event/:access_id`
pub async fn get(
    State(state): State<AppState>,
    Path(access_id): Path<String>,
) -> Result<Json<EventRegistration>, ApiError> {
    let registration = state
        .registrations
        .get_by_access_id(&AccessId::from(access_id))
        .await?;
    Ok(Json(registration))
}

/// `PATCH /api/email-event/:access_id`
///
/// Unknown or mistyped fields are rejected with 422, malformed JSON with 400.
pub async fn update(
    State(state): State<AppState>,
    Path(access_id): Path<String>,
    body: Bytes,
) -> Result<Json<EventRegistration>, ApiError> {
    let patch: RegistrationPatch = serde_json::from_slice(&body).map_err(|e| {
        if e.is_data() {
            ApiError::Unprocessable(e.to_string())
        } else {
            ApiError::BadRequest(e.to_string())
        }
    })?;

    let registration = state
        .registrations
        .update(&AccessId::from(access_id), &patch)
        .await?;
    Ok(Json(registration))
}

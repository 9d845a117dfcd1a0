//! Inbound email webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::signature::SignatureError;
use super::AppState;
use crate::domain::EmailId;

/// Event type announcing a newly received email.
pub const EMAIL_RECEIVED: &str = "email.received";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ReceivedData {
    email_id: EmailId,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn verify(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
    let id = header(headers, "svix-id")?;
    let timestamp = header(headers, "svix-timestamp")?;
    let signatures = header(headers, "svix-signature")?;
    state.verifier.verify(id, timestamp, signatures, body)
}

/// `POST /webhooks/email`
///
/// Starts an intake run for every received email and returns without waiting
/// for it. Other event types are acknowledged and ignored.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = verify(&state, &headers, &body) {
        warn!(error = %e, "rejected webhook delivery");
        return Err(ApiError::Unauthorized(e.to_string()));
    }

    let event: WebhookEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if event.event_type != EMAIL_RECEIVED {
        debug!(event_type = %event.event_type, "ignoring webhook event");
        return Ok(StatusCode::OK);
    }

    let data: ReceivedData =
        serde_json::from_value(event.data).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let run_id = state
        .intake
        .start_intake(data.email_id.clone())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(email_id = %data.email_id, %run_id, "intake started");
    Ok(StatusCode::OK)
}

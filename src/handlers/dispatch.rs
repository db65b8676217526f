use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{error::ApiError, extractors::ValidJson, state::AppState, types::DispatchResponse};

/// Trigger sent by the rest of the back office after a domain change, e.g.
/// `{"event": "campaign.created", "payload": {...}, "userId": "..."}`.
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub event: String,
    pub payload: Value,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

pub async fn dispatch_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<DispatchRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let event = req.event.trim();
    if event.is_empty() {
        return Err(ApiError::validation("event is required"));
    }

    let response = state
        .dispatcher
        .dispatch(event, req.payload, req.user_id)
        .await?;

    Ok(Json(response))
}

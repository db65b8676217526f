use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    delivery_logs::{ListLogsParams, list_logs},
    error::ApiError,
    extractors::{ValidJson, ValidPath, ValidQuery},
    state::AppState,
    subscriptions::{
        NewSubscription, create_subscription, delete_subscription, get_subscription,
        list_subscriptions, update_subscription,
    },
    types::{
        CreateWebhookRequest, DispatchOutcome, ListDeliveryLogsResponse, ListWebhooksResponse,
        UpdateWebhookRequest, WebhookSubscription,
    },
};

pub const TEST_EVENT: &str = "test.webhook";

#[derive(Debug, Deserialize)]
pub struct ListWebhooksQuery {
    owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    limit: Option<i64>,
    before: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    seq: i64,
}

pub async fn create_webhook_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<WebhookSubscription>), ApiError> {
    let new = NewSubscription::try_from(req)?;
    let subscription = create_subscription(&state.pool, new).await?;

    tracing::info!(
        webhook_id = %subscription.id,
        owner_id = %subscription.owner_id,
        events = ?subscription.events,
        "webhook created"
    );

    Ok((StatusCode::CREATED, Json(subscription.view())))
}

pub async fn list_webhooks_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListWebhooksQuery>,
) -> Result<Json<ListWebhooksResponse>, ApiError> {
    let webhooks = list_subscriptions(&state.pool, query.owner_id)
        .await?
        .iter()
        .map(|sub| sub.view())
        .collect();

    Ok(Json(ListWebhooksResponse { webhooks }))
}

pub async fn get_webhook_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<WebhookSubscription>, ApiError> {
    let subscription = get_subscription(&state.pool, id).await?;
    Ok(Json(subscription.view()))
}

pub async fn update_webhook_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateWebhookRequest>,
) -> Result<Json<WebhookSubscription>, ApiError> {
    let subscription = update_subscription(&state.pool, id, req).await?;
    tracing::info!(webhook_id = %id, is_active = subscription.is_active, "webhook updated");
    Ok(Json(subscription.view()))
}

pub async fn delete_webhook_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    delete_subscription(&state.pool, id).await?;
    tracing::info!(webhook_id = %id, "webhook deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Sends a `test.webhook` event to one subscription, whatever its active flag
/// and event list, through the normal retry and logging path.
pub async fn test_webhook_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let subscription = get_subscription(&state.pool, id).await?;
    let payload = json!({
        "message": "Teste de webhook",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });

    let outcome = state
        .dispatcher
        .deliver_to(&subscription, TEST_EVENT, &payload)
        .await;

    Ok(Json(outcome))
}

pub async fn list_logs_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidQuery(query): ValidQuery<ListLogsQuery>,
) -> Result<Json<ListDeliveryLogsResponse>, ApiError> {
    let limit = parse_limit(query.limit)?;
    let before = match query.before {
        Some(raw) => Some(decode_cursor(&raw)?),
        None => None,
    };

    let result = list_logs(&state.pool, id, &ListLogsParams { limit, before }).await?;
    let next_before = match result.next_before {
        Some(seq) => Some(encode_cursor(seq)?),
        None => None,
    };

    Ok(Json(ListDeliveryLogsResponse {
        logs: result.logs,
        next_before,
    }))
}

fn parse_limit(limit: Option<i64>) -> Result<i64, ApiError> {
    let limit = limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(ApiError::validation("limit must be between 1 and 200"));
    }
    Ok(limit)
}

fn decode_cursor(raw: &str) -> Result<i64, ApiError> {
    let invalid = || ApiError::validation("before must be a valid cursor");
    let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
    let payload: CursorPayload = serde_json::from_slice(&decoded).map_err(|_| invalid())?;
    Ok(payload.seq)
}

fn encode_cursor(seq: i64) -> Result<String, ApiError> {
    let encoded = serde_json::to_vec(&CursorPayload { seq })
        .map_err(|_| ApiError::Internal("failed to encode cursor".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(encoded))
}

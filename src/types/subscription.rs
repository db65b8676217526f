use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// Public view of a subscription. The shared secret is never part of it.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub retry_count: i64,
    pub timeout_ms: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Serialize, Deserialize, Type)]
pub struct CreateWebhookRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: Option<bool>,
    pub retry_count: Option<i64>,
    pub timeout_ms: Option<i64>,
}

impl std::fmt::Debug for CreateWebhookRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateWebhookRequest")
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("secret", &"[redacted]")
            .field("events", &self.events)
            .field("is_active", &self.is_active)
            .field("retry_count", &self.retry_count)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Type, Default)]
pub struct UpdateWebhookRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub retry_count: Option<i64>,
    pub timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListWebhooksResponse {
    pub webhooks: Vec<WebhookSubscription>,
}

use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookDeliveryLog {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event: String,
    /// JSON snapshot of the payload as it was dispatched.
    pub payload: String,

    pub status: DeliveryLogStatus,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    /// Set only when no HTTP response was obtained.
    pub error_message: Option<String>,

    pub attempt_number: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryLogStatus {
    Success,
    Failed,
    Retrying,
}

impl DeliveryLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryLogStatus::Success => "success",
            DeliveryLogStatus::Failed => "failed",
            DeliveryLogStatus::Retrying => "retrying",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListDeliveryLogsResponse {
    pub logs: Vec<WebhookDeliveryLog>,
    pub next_before: Option<String>,
}

use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// Terminal result of delivering one event to one subscription.
#[derive(Debug, Clone, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub subscription_id: Uuid,
    pub success: bool,
    /// HTTP status of the last attempt, if the subscriber responded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Transport error of the last attempt, if it never got a response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(untagged)]
pub enum DispatchResponse {
    Delivered { results: Vec<DispatchOutcome> },
    NoSubscriptions { message: String },
}

impl DispatchResponse {
    pub fn no_subscriptions() -> Self {
        Self::NoSubscriptions {
            message: "no subscriptions".to_string(),
        }
    }

    pub fn results(&self) -> &[DispatchOutcome] {
        match self {
            DispatchResponse::Delivered { results } => results,
            DispatchResponse::NoSubscriptions { .. } => &[],
        }
    }
}

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::delivery_logs;
use crate::error::StoreError;
use crate::subscriptions::{self, Subscription};
use crate::types::{DeliveryLogStatus, WebhookDeliveryLog};

/// Finds the active subscriptions of an account that listen to an event.
#[async_trait]
pub trait SubscriptionResolver: Send + Sync {
    async fn resolve(&self, event: &str, owner_id: Uuid) -> Result<Vec<Subscription>, StoreError>;
}

/// Append-only sink for attempt logs.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    async fn append(&self, log: &NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError>;
}

/// One attempt, as handed to a [`DeliveryLogStore`].
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub webhook_id: Uuid,
    pub event: String,
    pub payload: Value,
    pub status: DeliveryLogStatus,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub attempt_number: u32,
}

/// SQLite-backed resolver and log store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionResolver for SqliteStore {
    async fn resolve(&self, event: &str, owner_id: Uuid) -> Result<Vec<Subscription>, StoreError> {
        subscriptions::resolve_subscriptions(&self.pool, event, owner_id).await
    }
}

#[async_trait]
impl DeliveryLogStore for SqliteStore {
    async fn append(&self, log: &NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError> {
        delivery_logs::append_log(&self.pool, log).await
    }
}

/// In-memory store for embedding and tests.
#[derive(Default)]
pub struct InMemoryStore {
    subscriptions: Mutex<Vec<Subscription>>,
    logs: Mutex<Vec<WebhookDeliveryLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subscription: Subscription) {
        self.subscriptions.lock().await.push(subscription);
    }

    /// Every log appended so far, in append order.
    pub async fn logs(&self) -> Vec<WebhookDeliveryLog> {
        self.logs.lock().await.clone()
    }

    pub async fn logs_for(&self, webhook_id: Uuid) -> Vec<WebhookDeliveryLog> {
        self.logs
            .lock()
            .await
            .iter()
            .filter(|log| log.webhook_id == webhook_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubscriptionResolver for InMemoryStore {
    async fn resolve(&self, event: &str, owner_id: Uuid) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .iter()
            .filter(|sub| sub.is_active && sub.owner_id == owner_id && sub.listens_to(event))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryLogStore for InMemoryStore {
    async fn append(&self, log: &NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError> {
        let stored = WebhookDeliveryLog {
            id: Uuid::new_v4(),
            webhook_id: log.webhook_id,
            event: log.event.clone(),
            payload: log.payload.to_string(),
            status: log.status,
            response_status: log.response_status,
            response_body: log.response_body.clone(),
            error_message: log.error_message.clone(),
            attempt_number: i64::from(log.attempt_number),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.logs.lock().await.push(stored.clone());
        Ok(stored)
    }
}

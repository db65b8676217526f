use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::model::{NewSubscription, Subscription};
use crate::error::StoreError;
use crate::types::UpdateWebhookRequest;

const SELECT_COLUMNS: &str = "\
    id, owner_id, name, url, secret, events, is_active, retry_count, timeout_ms, \
    created_at, updated_at";

pub async fn create_subscription(
    pool: &SqlitePool,
    new: NewSubscription,
) -> Result<Subscription, StoreError> {
    let now = format_utc(Utc::now());
    let subscription = Subscription {
        id: Uuid::new_v4(),
        owner_id: new.owner_id,
        name: new.name,
        url: new.url,
        secret: new.secret,
        events: new.events,
        is_active: new.is_active,
        retry_count: new.retry_count,
        timeout_ms: new.timeout_ms,
        created_at: now.clone(),
        updated_at: now,
    };
    let events = encode_events(&subscription.events)?;

    sqlx::query(
        r#"
        INSERT INTO webhooks (
            id,
            owner_id,
            name,
            url,
            secret,
            events,
            is_active,
            retry_count,
            timeout_ms,
            created_at,
            updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subscription.id.to_string())
    .bind(subscription.owner_id.to_string())
    .bind(&subscription.name)
    .bind(&subscription.url)
    .bind(&subscription.secret)
    .bind(events)
    .bind(subscription.is_active)
    .bind(i64::from(subscription.retry_count))
    .bind(subscription.timeout_ms as i64)
    .bind(&subscription.created_at)
    .bind(&subscription.updated_at)
    .execute(pool)
    .await?;

    Ok(subscription)
}

pub async fn get_subscription(pool: &SqlitePool, id: Uuid) -> Result<Subscription, StoreError> {
    let query = format!("SELECT {SELECT_COLUMNS} FROM webhooks WHERE id = ?");
    sqlx::query_as::<_, SubscriptionRow>(&query)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("webhook not found".to_string()))?
        .try_into()
}

pub async fn list_subscriptions(
    pool: &SqlitePool,
    owner_id: Uuid,
) -> Result<Vec<Subscription>, StoreError> {
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM webhooks WHERE owner_id = ? ORDER BY created_at ASC, id ASC"
    );
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&query)
        .bind(owner_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Subscription::try_from).collect()
}

/// Active subscriptions of `owner_id` whose event set contains `event`.
pub async fn resolve_subscriptions(
    pool: &SqlitePool,
    event: &str,
    owner_id: Uuid,
) -> Result<Vec<Subscription>, StoreError> {
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM webhooks \
         WHERE is_active = 1 \
           AND owner_id = ? \
           AND EXISTS (SELECT 1 FROM json_each(webhooks.events) WHERE json_each.value = ?) \
         ORDER BY created_at ASC, id ASC"
    );
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&query)
        .bind(owner_id.to_string())
        .bind(event)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Subscription::try_from).collect()
}

pub async fn update_subscription(
    pool: &SqlitePool,
    id: Uuid,
    update: UpdateWebhookRequest,
) -> Result<Subscription, StoreError> {
    let mut tx = pool.begin().await?;

    let query = format!("SELECT {SELECT_COLUMNS} FROM webhooks WHERE id = ?");
    let mut subscription: Subscription = sqlx::query_as::<_, SubscriptionRow>(&query)
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("webhook not found".to_string()))?
        .try_into()?;

    subscription.apply_update(update)?;
    subscription.updated_at = format_utc(Utc::now());
    let events = encode_events(&subscription.events)?;

    sqlx::query(
        r#"
        UPDATE webhooks
        SET name = ?,
            url = ?,
            events = ?,
            is_active = ?,
            retry_count = ?,
            timeout_ms = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&subscription.name)
    .bind(&subscription.url)
    .bind(events)
    .bind(subscription.is_active)
    .bind(i64::from(subscription.retry_count))
    .bind(subscription.timeout_ms as i64)
    .bind(&subscription.updated_at)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(subscription)
}

/// Delete a subscription. Its delivery logs are kept.
pub async fn delete_subscription(pool: &SqlitePool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM webhooks WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("webhook not found".to_string()));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    owner_id: String,
    name: String,
    url: String,
    secret: String,
    events: String,
    is_active: bool,
    retry_count: i64,
    timeout_ms: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let events: Vec<String> = serde_json::from_str(&row.events)
            .map_err(|err| StoreError::Parse(format!("invalid events JSON: {err}")))?;

        Ok(Subscription {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| StoreError::Parse(format!("invalid webhook id: {err}")))?,
            owner_id: Uuid::parse_str(&row.owner_id)
                .map_err(|err| StoreError::Parse(format!("invalid owner id: {err}")))?,
            name: row.name,
            url: row.url,
            secret: row.secret,
            events,
            is_active: row.is_active,
            retry_count: u32::try_from(row.retry_count)
                .map_err(|err| StoreError::Parse(format!("invalid retry_count: {err}")))?,
            timeout_ms: u64::try_from(row.timeout_ms)
                .map_err(|err| StoreError::Parse(format!("invalid timeout_ms: {err}")))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_events(events: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(events)
        .map_err(|err| StoreError::Parse(format!("invalid events JSON: {err}")))
}

fn format_utc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

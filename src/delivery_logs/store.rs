use chrono::{SecondsFormat, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use crate::dispatcher::NewDeliveryLog;
use crate::error::StoreError;
use crate::types::{DeliveryLogStatus, WebhookDeliveryLog};

#[derive(Debug, Clone)]
pub struct ListLogsParams {
    pub limit: i64,
    /// Only rows older than this position are returned.
    pub before: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ListLogsResult {
    pub logs: Vec<WebhookDeliveryLog>,
    pub next_before: Option<i64>,
}

pub async fn append_log(
    pool: &SqlitePool,
    log: &NewDeliveryLog,
) -> Result<WebhookDeliveryLog, StoreError> {
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
        created_at: format_utc(Utc::now()),
    };

    sqlx::query(
        r#"
        INSERT INTO webhook_logs (
            id,
            webhook_id,
            event,
            payload,
            status,
            response_status,
            response_body,
            error_message,
            attempt_number,
            created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stored.id.to_string())
    .bind(stored.webhook_id.to_string())
    .bind(&stored.event)
    .bind(&stored.payload)
    .bind(stored.status.as_str())
    .bind(stored.response_status)
    .bind(stored.response_body.as_deref())
    .bind(stored.error_message.as_deref())
    .bind(stored.attempt_number)
    .bind(&stored.created_at)
    .execute(pool)
    .await?;

    Ok(stored)
}

/// Newest-first page of a webhook's delivery logs.
pub async fn list_logs(
    pool: &SqlitePool,
    webhook_id: Uuid,
    params: &ListLogsParams,
) -> Result<ListLogsResult, StoreError> {
    let mut query = QueryBuilder::new(
        "SELECT \
            seq, \
            id, \
            webhook_id, \
            event, \
            payload, \
            status, \
            response_status, \
            response_body, \
            error_message, \
            attempt_number, \
            created_at \
        FROM webhook_logs \
        WHERE webhook_id = ",
    );
    query.push_bind(webhook_id.to_string());

    if let Some(before) = params.before {
        query.push(" AND seq < ");
        query.push_bind(before);
    }

    query.push(" ORDER BY seq DESC LIMIT ");
    query.push_bind(params.limit + 1);

    let rows: Vec<LogRow> = query.build_query_as().fetch_all(pool).await?;

    let has_more = rows.len() > params.limit as usize;
    let mut logs = Vec::with_capacity(rows.len().min(params.limit as usize));
    let mut last_seq = None;

    for row in rows.into_iter().take(params.limit as usize) {
        last_seq = Some(row.seq);
        logs.push(row.try_into()?);
    }

    Ok(ListLogsResult {
        logs,
        next_before: if has_more { last_seq } else { None },
    })
}

#[derive(sqlx::FromRow)]
struct LogRow {
    seq: i64,
    id: String,
    webhook_id: String,
    event: String,
    payload: String,
    status: String,
    response_status: Option<i64>,
    response_body: Option<String>,
    error_message: Option<String>,
    attempt_number: i64,
    created_at: String,
}

impl TryFrom<LogRow> for WebhookDeliveryLog {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(WebhookDeliveryLog {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| StoreError::Parse(format!("invalid log id: {err}")))?,
            webhook_id: Uuid::parse_str(&row.webhook_id)
                .map_err(|err| StoreError::Parse(format!("invalid webhook id: {err}")))?,
            event: row.event,
            payload: row.payload,
            status: parse_status(&row.status)?,
            response_status: row.response_status,
            response_body: row.response_body,
            error_message: row.error_message,
            attempt_number: row.attempt_number,
            created_at: row.created_at,
        })
    }
}

fn parse_status(status: &str) -> Result<DeliveryLogStatus, StoreError> {
    match status {
        "success" => Ok(DeliveryLogStatus::Success),
        "failed" => Ok(DeliveryLogStatus::Failed),
        "retrying" => Ok(DeliveryLogStatus::Retrying),
        other => Err(StoreError::Parse(format!("unknown log status: {other}"))),
    }
}

fn format_utc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

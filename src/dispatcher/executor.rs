//! Single delivery attempts against a subscriber endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use super::signing;
use crate::subscriptions::Subscription;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";
pub const WEBHOOK_ID_HEADER: &str = "X-Webhook-Id";

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The subscriber answered; `body` is already truncated.
    Responded { status: u16, body: String },
    /// No HTTP response: timeout, connect/DNS failure, bad URL, broken body.
    TransportFailure { message: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Responded { status, .. } if (200..300).contains(status))
    }
}

/// Performs exactly one delivery attempt. Implementations must not retry,
/// sleep between attempts or write logs.
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    async fn execute(
        &self,
        subscription: &Subscription,
        event: &str,
        payload: &Value,
        attempt: u32,
    ) -> AttemptOutcome;
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    timestamp: String,
    data: &'a Value,
}

/// [`AttemptExecutor`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    body_limit: usize,
}

impl HttpExecutor {
    pub fn new(user_agent: &str, body_limit: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, body_limit })
    }
}

#[async_trait]
impl AttemptExecutor for HttpExecutor {
    async fn execute(
        &self,
        subscription: &Subscription,
        event: &str,
        payload: &Value,
        attempt: u32,
    ) -> AttemptOutcome {
        let signature = match signing::sign(payload, &subscription.secret) {
            Ok(signature) => signature,
            Err(err) => {
                tracing::error!(
                    subscription_id = %subscription.id,
                    attempt,
                    error = %err,
                    "refusing to send unsigned webhook"
                );
                return AttemptOutcome::TransportFailure {
                    message: format!("failed to sign payload: {err}"),
                };
            }
        };
        let envelope = Envelope {
            event,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data: payload,
        };
        let timeout = Duration::from_millis(subscription.timeout_ms);

        let response = self
            .client
            .post(&subscription.url)
            .timeout(timeout)
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_TYPE_HEADER, event)
            .header(WEBHOOK_ID_HEADER, subscription.id.to_string())
            .json(&envelope)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                return AttemptOutcome::TransportFailure {
                    message: describe_transport_error(&err, subscription.timeout_ms),
                };
            }
        };

        let status = response.status().as_u16();
        match read_capped(response, self.body_limit.saturating_mul(4)).await {
            Ok(body) => AttemptOutcome::Responded {
                status,
                body: truncate_chars(&body, self.body_limit),
            },
            Err(err) => {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    attempt,
                    status,
                    error = %err,
                    "failed to read webhook response body"
                );
                AttemptOutcome::TransportFailure {
                    message: format!(
                        "{} (status {status})",
                        describe_transport_error(&err, subscription.timeout_ms)
                    ),
                }
            }
        }
    }
}

/// Read at most `max_bytes` of the body and drop the rest. A character is at
/// most 4 bytes, so `4 * limit` bytes always hold the first `limit` characters.
async fn read_capped(mut response: Response, max_bytes: usize) -> Result<String, reqwest::Error> {
    let mut buf = Vec::with_capacity(max_bytes.min(8 * 1024));
    while buf.len() < max_bytes {
        let Some(chunk) = response.chunk().await? else {
            break;
        };
        let room = max_bytes - buf.len();
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn describe_transport_error(err: &reqwest::Error, timeout_ms: u64) -> String {
    if err.is_timeout() {
        format!("request timed out after {timeout_ms}ms")
    } else if err.is_builder() {
        format!("invalid request: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    }
}

/// Keep at most `limit` characters (not bytes) of `body`.
pub fn truncate_chars(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body.to_string(),
    }
}

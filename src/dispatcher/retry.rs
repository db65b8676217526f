//! Per-subscription retry state machine.
//!
//! ```text
//! Idle ──begin──▶ Attempting(1)
//! Attempting(n) ──2xx──────────────────────────▶ Succeeded      log: success
//! Attempting(n) ──failure, n < retry_count─────▶ Attempting(n+1) log: retrying, sleep base*n
//! Attempting(n) ──failure, n >= retry_count────▶ Exhausted      log: failed
//! ```
//!
//! A `retry_count` of zero still makes one attempt.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::config::DispatcherConfig;
use super::executor::{AttemptExecutor, AttemptOutcome};
use super::store::{DeliveryLogStore, NewDeliveryLog};
use crate::subscriptions::Subscription;
use crate::types::{DeliveryLogStatus, DispatchOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Attempting {
        attempt: u32,
    },
    Succeeded {
        attempt: u32,
        status: u16,
    },
    Exhausted {
        attempt: u32,
        status: Option<u16>,
        error: Option<String>,
    },
}

impl DeliveryState {
    pub fn begin(&self) -> DeliveryState {
        match self {
            DeliveryState::Idle => DeliveryState::Attempting { attempt: 1 },
            other => other.clone(),
        }
    }

    /// Next state after the current attempt produced `outcome`.
    /// Terminal and idle states are returned unchanged.
    pub fn advance(&self, outcome: &AttemptOutcome, retry_count: u32) -> DeliveryState {
        let DeliveryState::Attempting { attempt } = *self else {
            return self.clone();
        };

        if let AttemptOutcome::Responded { status, .. } = outcome
            && outcome.is_success()
        {
            return DeliveryState::Succeeded {
                attempt,
                status: *status,
            };
        }

        if attempt < retry_count {
            return DeliveryState::Attempting {
                attempt: attempt + 1,
            };
        }

        let (status, error) = match outcome {
            AttemptOutcome::Responded { status, .. } => (Some(*status), None),
            AttemptOutcome::TransportFailure { message } => (None, Some(message.clone())),
        };
        DeliveryState::Exhausted {
            attempt,
            status,
            error,
        }
    }

    /// Status recorded for the attempt that led into this state.
    pub fn log_status(&self) -> Option<DeliveryLogStatus> {
        match self {
            DeliveryState::Idle => None,
            DeliveryState::Attempting { .. } => Some(DeliveryLogStatus::Retrying),
            DeliveryState::Succeeded { .. } => Some(DeliveryLogStatus::Success),
            DeliveryState::Exhausted { .. } => Some(DeliveryLogStatus::Failed),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Succeeded { .. } | DeliveryState::Exhausted { .. }
        )
    }

    pub fn outcome(&self, subscription_id: Uuid) -> Option<DispatchOutcome> {
        match self {
            DeliveryState::Succeeded { attempt, status } => Some(DispatchOutcome {
                subscription_id,
                success: true,
                status: Some(i64::from(*status)),
                error: None,
                attempts: i64::from(*attempt),
            }),
            DeliveryState::Exhausted {
                attempt,
                status,
                error,
            } => Some(DispatchOutcome {
                subscription_id,
                success: false,
                status: status.map(i64::from),
                error: error.clone(),
                attempts: i64::from(*attempt),
            }),
            DeliveryState::Idle | DeliveryState::Attempting { .. } => None,
        }
    }
}

/// Drives [`DeliveryState`] for one subscription: executes attempts, writes
/// one log row per attempt and sleeps between attempts.
pub struct RetryScheduler {
    executor: Arc<dyn AttemptExecutor>,
    logs: Arc<dyn DeliveryLogStore>,
    config: DispatcherConfig,
}

impl RetryScheduler {
    pub fn new(
        executor: Arc<dyn AttemptExecutor>,
        logs: Arc<dyn DeliveryLogStore>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            executor,
            logs,
            config,
        }
    }

    pub async fn run(
        &self,
        subscription: &Subscription,
        event: &str,
        payload: &Value,
    ) -> DispatchOutcome {
        let mut state = DeliveryState::Idle.begin();

        loop {
            let DeliveryState::Attempting { attempt } = state else {
                break;
            };

            let outcome = self
                .executor
                .execute(subscription, event, payload, attempt)
                .await;
            let next = state.advance(&outcome, subscription.retry_count);

            if let Some(status) = next.log_status() {
                self.record(subscription, event, payload, attempt, &outcome, status)
                    .await;
            }

            match &outcome {
                AttemptOutcome::Responded { status, .. } => tracing::info!(
                    subscription_id = %subscription.id,
                    event,
                    attempt,
                    status,
                    terminal = next.is_terminal(),
                    "webhook attempt responded"
                ),
                AttemptOutcome::TransportFailure { message } => tracing::warn!(
                    subscription_id = %subscription.id,
                    event,
                    attempt,
                    error = %message,
                    terminal = next.is_terminal(),
                    "webhook attempt failed without response"
                ),
            }

            if !next.is_terminal() {
                tokio::time::sleep(self.config.backoff_after(attempt)).await;
            }
            state = next;
        }

        state.outcome(subscription.id).unwrap_or(DispatchOutcome {
            subscription_id: subscription.id,
            success: false,
            status: None,
            error: Some("delivery ended without a terminal state".to_string()),
            attempts: 0,
        })
    }

    /// Best-effort append: retried up to `log_write_attempts` times, then
    /// reported and dropped. A lost log row never changes the delivery outcome.
    async fn record(
        &self,
        subscription: &Subscription,
        event: &str,
        payload: &Value,
        attempt: u32,
        outcome: &AttemptOutcome,
        status: DeliveryLogStatus,
    ) {
        let (response_status, response_body, error_message) = match outcome {
            AttemptOutcome::Responded { status, body } => {
                (Some(i64::from(*status)), Some(body.clone()), None)
            }
            AttemptOutcome::TransportFailure { message } => (None, None, Some(message.clone())),
        };
        let log = NewDeliveryLog {
            webhook_id: subscription.id,
            event: event.to_string(),
            payload: payload.clone(),
            status,
            response_status,
            response_body,
            error_message,
            attempt_number: attempt,
        };

        let max_tries = self.config.log_write_attempts.max(1);
        for try_no in 1..=max_tries {
            match self.logs.append(&log).await {
                Ok(_) => return,
                Err(err) if try_no < max_tries => tracing::warn!(
                    subscription_id = %subscription.id,
                    event,
                    attempt,
                    error = %err,
                    "failed to write delivery log, retrying"
                ),
                Err(err) => tracing::error!(
                    subscription_id = %subscription.id,
                    event,
                    attempt,
                    status = status.as_str(),
                    error = %err,
                    "dropping delivery log after repeated write failures"
                ),
            }
        }
    }
}

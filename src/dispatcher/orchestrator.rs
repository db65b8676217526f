use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::config::DispatcherConfig;
use super::executor::AttemptExecutor;
use super::retry::RetryScheduler;
use super::store::{DeliveryLogStore, SubscriptionResolver};
use crate::error::DispatchError;
use crate::subscriptions::Subscription;
use crate::types::{DispatchOutcome, DispatchResponse};

/// Fans one event out to every matching subscription of an account.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn SubscriptionResolver>,
    scheduler: Arc<RetryScheduler>,
}

impl Dispatcher {
    pub fn new(
        resolver: Arc<dyn SubscriptionResolver>,
        logs: Arc<dyn DeliveryLogStore>,
        executor: Arc<dyn AttemptExecutor>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            resolver,
            scheduler: Arc::new(RetryScheduler::new(executor, logs, config)),
        }
    }

    /// Deliver `event` to every active subscription of `owner_id` that
    /// listens to it.
    ///
    /// Subscriptions are delivered concurrently, each with its own strictly
    /// sequential attempts. Results keep resolution order. Only a failure to
    /// resolve subscriptions is returned as an error.
    pub async fn dispatch(
        &self,
        event: &str,
        payload: Value,
        owner_id: Uuid,
    ) -> Result<DispatchResponse, DispatchError> {
        let subscriptions = self
            .resolver
            .resolve(event, owner_id)
            .await
            .map_err(|err| {
                tracing::error!(event, %owner_id, error = %err, "failed to resolve subscriptions");
                DispatchError::Resolution(err)
            })?;

        if subscriptions.is_empty() {
            tracing::debug!(event, %owner_id, "no subscriptions match event");
            return Ok(DispatchResponse::no_subscriptions());
        }

        tracing::info!(
            event,
            %owner_id,
            subscription_count = subscriptions.len(),
            "dispatching event"
        );

        let event: Arc<str> = Arc::from(event);
        let payload = Arc::new(payload);
        let mut handles = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            let scheduler = Arc::clone(&self.scheduler);
            let event = Arc::clone(&event);
            let payload = Arc::clone(&payload);
            let subscription_id = subscription.id;
            let span = tracing::info_span!("deliver", subscription_id = %subscription_id, event = %event);

            let handle = tokio::spawn(
                async move { scheduler.run(&subscription, &event, &payload).await }
                    .instrument(span),
            );
            handles.push((subscription_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (subscription_id, handle) in handles {
            match handle.await {
                Ok(outcome) => results.push(outcome),
                Err(err) => {
                    tracing::error!(%subscription_id, error = %err, "delivery task aborted");
                    results.push(DispatchOutcome {
                        subscription_id,
                        success: false,
                        status: None,
                        error: Some(format!("delivery task aborted: {err}")),
                        attempts: 0,
                    });
                }
            }
        }

        Ok(DispatchResponse::Delivered { results })
    }

    /// Run the retry loop for one already-loaded subscription, regardless of
    /// its active flag or event list.
    pub async fn deliver_to(
        &self,
        subscription: &Subscription,
        event: &str,
        payload: &Value,
    ) -> DispatchOutcome {
        self.scheduler.run(subscription, event, payload).await
    }
}

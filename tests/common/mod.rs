#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tempfile::NamedTempFile;
use tokio::time::Instant;
use uuid::Uuid;
use webhook_dispatch::{
    dispatcher::{
        AttemptExecutor, AttemptOutcome, DeliveryLogStore, InMemoryStore, NewDeliveryLog,
        SubscriptionResolver,
    },
    error::StoreError,
    subscriptions::Subscription,
    types::WebhookDeliveryLog,
};

pub const SECRET: &str = "whsec_test_secret_key_12345";

pub struct TestDb {
    pub pool: SqlitePool,
    _db_file: NamedTempFile,
}

pub async fn setup_db() -> TestDb {
    let db_file = NamedTempFile::new().expect("create temp sqlite file");
    let options = SqliteConnectOptions::new()
        .filename(db_file.path())
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_millis(500));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect sqlite file");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    TestDb {
        pool,
        _db_file: db_file,
    }
}

pub fn subscription(owner_id: Uuid, url: &str, events: &[&str]) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        owner_id,
        name: "agency hook".to_string(),
        url: url.to_string(),
        secret: SECRET.to_string(),
        events: events.iter().map(|e| e.to_string()).collect(),
        is_active: true,
        retry_count: 3,
        timeout_ms: 5_000,
        created_at: "2024-01-01T00:00:00.000000Z".to_string(),
        updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
    }
}

pub fn responded(status: u16) -> AttemptOutcome {
    AttemptOutcome::Responded {
        status,
        body: format!("status {status}"),
    }
}

pub fn transport(message: &str) -> AttemptOutcome {
    AttemptOutcome::TransportFailure {
        message: message.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub subscription_id: Uuid,
    pub event: String,
    pub attempt: u32,
    pub at: Instant,
}

/// Executor that plays back scripted outcomes per subscription and records
/// every call. Once a script runs out the fallback outcome is returned.
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<Uuid, VecDeque<AttemptOutcome>>>,
    fallback: AttemptOutcome,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedExecutor {
    pub fn always(outcome: AttemptOutcome) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, subscription_id: Uuid, outcomes: Vec<AttemptOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(subscription_id, outcomes.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, subscription_id: Uuid) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.subscription_id == subscription_id)
            .collect()
    }
}

#[async_trait]
impl AttemptExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        subscription: &Subscription,
        event: &str,
        _payload: &Value,
        attempt: u32,
    ) -> AttemptOutcome {
        self.calls.lock().unwrap().push(Call {
            subscription_id: subscription.id,
            event: event.to_string(),
            attempt,
            at: Instant::now(),
        });

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&subscription.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Log store that rejects the first `failures` appends, then forwards to an
/// in-memory store.
pub struct FlakyLogStore {
    pub inner: InMemoryStore,
    remaining_failures: Mutex<u32>,
    pub rejected: Mutex<u32>,
}

impl FlakyLogStore {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: InMemoryStore::new(),
            remaining_failures: Mutex::new(failures),
            rejected: Mutex::new(0),
        }
    }

    pub fn rejected(&self) -> u32 {
        *self.rejected.lock().unwrap()
    }
}

#[async_trait]
impl DeliveryLogStore for FlakyLogStore {
    async fn append(&self, log: &NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError> {
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                *self.rejected.lock().unwrap() += 1;
                return Err(StoreError::Parse("log table unavailable".to_string()));
            }
        }
        self.inner.append(log).await
    }
}

pub struct BrokenResolver;

#[async_trait]
impl SubscriptionResolver for BrokenResolver {
    async fn resolve(&self, _event: &str, _owner_id: Uuid) -> Result<Vec<Subscription>, StoreError> {
        Err(StoreError::Parse("storage unavailable".to_string()))
    }
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{CreateWebhookRequest, UpdateWebhookRequest, WebhookSubscription};

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const MIN_SECRET_LEN: usize = 16;

const RETRY_COUNT_RANGE: RangeInclusive<i64> = 0..=10;
const TIMEOUT_MS_RANGE: RangeInclusive<i64> = 1_000..=30_000;

/// A registered subscriber endpoint, including its signing secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub retry_count: u32,
    pub timeout_ms: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Subscription {
    pub fn view(&self) -> WebhookSubscription {
        WebhookSubscription {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name.clone(),
            url: self.url.clone(),
            events: self.events.clone(),
            is_active: self.is_active,
            retry_count: i64::from(self.retry_count),
            timeout_ms: self.timeout_ms as i64,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    pub fn listens_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }

    /// Apply a partial update, re-checking every invariant it touches.
    pub fn apply_update(&mut self, update: UpdateWebhookRequest) -> Result<(), StoreError> {
        if let Some(name) = update.name {
            self.name = validate_name(&name)?;
        }
        if let Some(url) = update.url {
            self.url = validate_url(&url)?;
        }
        if let Some(events) = update.events {
            self.events = validate_events(events)?;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = validate_retry_count(retry_count)?;
        }
        if let Some(timeout_ms) = update.timeout_ms {
            self.timeout_ms = validate_timeout_ms(timeout_ms)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("secret", &"[redacted]")
            .field("events", &self.events)
            .field("is_active", &self.is_active)
            .field("retry_count", &self.retry_count)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

/// A validated creation request.
#[derive(Clone)]
pub struct NewSubscription {
    pub owner_id: Uuid,
    pub name: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub retry_count: u32,
    pub timeout_ms: u64,
}

impl TryFrom<CreateWebhookRequest> for NewSubscription {
    type Error = StoreError;

    fn try_from(req: CreateWebhookRequest) -> Result<Self, Self::Error> {
        if req.secret.chars().count() < MIN_SECRET_LEN {
            return Err(StoreError::Validation(format!(
                "secret must be at least {MIN_SECRET_LEN} characters"
            )));
        }

        Ok(Self {
            owner_id: req.owner_id,
            name: validate_name(&req.name)?,
            url: validate_url(&req.url)?,
            secret: req.secret,
            events: validate_events(req.events)?,
            is_active: req.is_active.unwrap_or(true),
            retry_count: match req.retry_count {
                Some(value) => validate_retry_count(value)?,
                None => DEFAULT_RETRY_COUNT,
            },
            timeout_ms: match req.timeout_ms {
                Some(value) => validate_timeout_ms(value)?,
                None => DEFAULT_TIMEOUT_MS,
            },
        })
    }
}

fn validate_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

fn validate_url(url: &str) -> Result<String, StoreError> {
    let trimmed = url.trim();
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|_| StoreError::Validation("url must be an absolute URL".to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StoreError::Validation(
            "url scheme must be http or https".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_events(events: Vec<String>) -> Result<Vec<String>, StoreError> {
    let mut unique = BTreeSet::new();
    for event in events {
        let trimmed = event.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Validation(
                "event names must be non-empty".to_string(),
            ));
        }
        unique.insert(trimmed.to_string());
    }
    if unique.is_empty() {
        return Err(StoreError::Validation(
            "at least one event is required".to_string(),
        ));
    }
    Ok(unique.into_iter().collect())
}

fn validate_retry_count(value: i64) -> Result<u32, StoreError> {
    if !RETRY_COUNT_RANGE.contains(&value) {
        return Err(StoreError::Validation(
            "retry_count must be between 0 and 10".to_string(),
        ));
    }
    Ok(value as u32)
}

fn validate_timeout_ms(value: i64) -> Result<u64, StoreError> {
    if !TIMEOUT_MS_RANGE.contains(&value) {
        return Err(StoreError::Validation(
            "timeout_ms must be between 1000 and 30000".to_string(),
        ));
    }
    Ok(value as u64)
}

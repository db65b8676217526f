//! Webhook dispatch service for the agency back office.
//!
//! Domain events (`campaign.created`, `client.updated`, ...) are fanned out to
//! every active subscription of the owning account. Each subscription gets
//! HMAC-signed, time-bounded POST attempts with linear backoff, and every
//! attempt is appended to the delivery log.

pub mod auth;
pub mod config;
pub mod delivery_logs;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod subscriptions;
pub mod types;

mod config;
mod executor;
mod orchestrator;
mod retry;
pub mod signing;
mod store;

pub use config::DispatcherConfig;
pub use executor::{
    AttemptExecutor, AttemptOutcome, EVENT_TYPE_HEADER, HttpExecutor, SIGNATURE_HEADER,
    WEBHOOK_ID_HEADER, truncate_chars,
};
pub use orchestrator::Dispatcher;
pub use retry::{DeliveryState, RetryScheduler};
pub use store::{
    DeliveryLogStore, InMemoryStore, NewDeliveryLog, SqliteStore, SubscriptionResolver,
};

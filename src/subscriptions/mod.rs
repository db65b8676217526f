mod model;
pub mod store;

pub use model::{
    DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT_MS, MIN_SECRET_LEN, NewSubscription, Subscription,
};
pub use store::{
    create_subscription, delete_subscription, get_subscription, list_subscriptions,
    resolve_subscriptions, update_subscription,
};

pub mod dispatch;
pub mod webhooks;

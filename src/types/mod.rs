pub mod api_error;
pub mod delivery_log;
pub mod dispatch;
pub mod subscription;

#[allow(unused_imports)]
pub use api_error::{ApiErrorCode, ApiErrorResponse};
#[allow(unused_imports)]
pub use delivery_log::{DeliveryLogStatus, ListDeliveryLogsResponse, WebhookDeliveryLog};
#[allow(unused_imports)]
pub use dispatch::{DispatchOutcome, DispatchResponse};
#[allow(unused_imports)]
pub use subscription::{
    CreateWebhookRequest, ListWebhooksResponse, UpdateWebhookRequest, WebhookSubscription,
};

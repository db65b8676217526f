use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    auth::api_auth,
    handlers::{
        dispatch::dispatch_handler,
        webhooks::{
            create_webhook_handler, delete_webhook_handler, get_webhook_handler,
            list_logs_handler, list_webhooks_handler, test_webhook_handler,
            update_webhook_handler,
        },
    },
    state::AppState,
};

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/webhooks/dispatch", post(dispatch_handler))
        .route(
            "/webhooks",
            post(create_webhook_handler).get(list_webhooks_handler),
        )
        .route(
            "/webhooks/:id",
            get(get_webhook_handler)
                .patch(update_webhook_handler)
                .delete(delete_webhook_handler),
        )
        .route("/webhooks/:id/test", post(test_webhook_handler))
        .route("/webhooks/:id/logs", get(list_logs_handler))
        .layer(middleware::from_fn_with_state(state.clone(), api_auth));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

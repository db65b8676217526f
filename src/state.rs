use sqlx::SqlitePool;

use crate::dispatcher::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub dispatcher: Dispatcher,
    /// Bearer token required on the API; `None` leaves it open.
    pub api_token: Option<String>,
}

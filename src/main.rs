use std::{net::SocketAddr, sync::Arc};

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webhook_dispatch::{
    config::ServerConfig,
    dispatcher::{Dispatcher, DispatcherConfig, HttpExecutor, SqliteStore},
    routes::app,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webhook_dispatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env();
    let dispatcher_config = DispatcherConfig::from_env();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&server.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let executor = Arc::new(HttpExecutor::new(
        &dispatcher_config.user_agent,
        dispatcher_config.response_body_limit,
    )?);
    let dispatcher = Dispatcher::new(store.clone(), store, executor, dispatcher_config);

    let state = AppState {
        pool,
        dispatcher,
        api_token: server.api_token,
    };

    let addr: SocketAddr = server.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "webhook dispatch service listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}

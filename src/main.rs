// Coral Wallet Server
// JSON transport over the wallet core

use anyhow::Result;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use coral_wallet::config::Config;
use coral_wallet::database::Database;
use coral_wallet::http::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("coral_wallet=info".parse()?)
                .add_directive("sqlx=warn".parse()?),
        )
        .init();

    info!("Starting Coral Wallet Server");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Database: {}", config.database_url);
    info!("  Server Port: {}", config.port);

    // Initialize database
    let db = Database::init(&config.database_url).await?;

    let state = Arc::new(AppState { db });

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Coral Wallet listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

//! Pokesync Server binary.

use pokesync_server::config::Config;
use pokesync_server::db::{self, Database, MemoryDatabase};
use pokesync_server::{build_router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pokesync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Pokesync Server on {}:{}", config.host, config.port);

    // Relational backend
    let database = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await?;
            Database::Postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, ranking and favorites tables are kept in memory");
            Database::Memory(MemoryDatabase::new())
        }
    };

    // Build application state
    let state = AppState::build(config.clone(), database).await?;
    if config.scheduler_autostart {
        state.scheduler.start().await;
    }
    let scheduler = state.scheduler.clone();

    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

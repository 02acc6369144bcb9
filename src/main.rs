use std::net::SocketAddr;

use anyhow::Context;
use inflowdesk::config::AppConfig;
use inflowdesk::storage::StorageGateway;
use inflowdesk::{db, routes, AppState};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inflowdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("DATABASE_URL must be set")?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await.context("Failed to run migrations")?;

    let storage = StorageGateway::from_config(&config.storage).context("Invalid storage configuration")?;
    if !storage.is_configured() {
        tracing::warn!("Object storage disabled; uploads will be reported as failures");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid BACKEND_HOST/BACKEND_PORT")?;
    tracing::info!(
        host = %addr,
        storage = storage.backend_name(),
        max_upload_bytes = config.max_upload_bytes,
        "Starting inflow API server"
    );

    let app = routes::router(AppState {
        db: pool,
        config,
        storage,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

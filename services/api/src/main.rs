use anyhow::Result;
use auth::{AuthService, JwtConfig, JwtService, RateLimiter, RateLimiterConfig, UserRepository};
use axum::{extract::DefaultBodyLimit, http::HeaderValue};
use common::{
    config::AppConfig,
    database::{DatabaseConfig, init_pool, run_migrations},
};
use media::{FfmpegProcessor, LocalStorage, StorageBackend, thumbnail_generator::ThumbnailGenerator};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use api::{AppState, MIGRATOR, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting API service");

    let config = AppConfig::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool, &MIGRATOR).await?;

    let local = LocalStorage::new(&config.upload_dir, &config.public_upload_prefix);
    local.ensure_dir().await?;
    let storage: Arc<dyn StorageBackend> = Arc::new(local);

    let auth = AuthService::new(
        UserRepository::new(pool.clone()),
        JwtService::new(JwtConfig::from_env()?),
        RateLimiter::new(RateLimiterConfig::default()),
    );

    let processor = Arc::new(FfmpegProcessor::new(
        storage.clone(),
        ThumbnailGenerator::new(&config.upload_dir),
    ));

    let origin: HeaderValue = config.client_url.parse()?;
    let body_limit = config.max_upload_bytes;
    let addr = config.server_addr.clone();

    let state = AppState::new(pool, config, auth, storage, processor);

    let app = create_router(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use segmentation_service::config::Config;
use segmentation_service::db::PgInteractionStore;
use segmentation_service::handlers::{self, AppState};
use segmentation_service::services::SegmentationService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Loaded first so LOG_LEVEL can seed the filter
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(log_level = %config.log_level, "Starting segmentation-service");
    config.validate()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Connected to interaction log database"
    );

    let store = Arc::new(PgInteractionStore::new(db_pool));
    let service = Arc::new(SegmentationService::from_config(store, &config));
    let state = web::Data::new(AppState { service });

    tracing::info!(
        lookback_days = config.lookback_days,
        cache_enabled = config.cache_enabled,
        cache_ttl_seconds = config.cache_ttl_seconds,
        "Segmentation pipeline ready"
    );

    let bind_addr = (config.http_host.clone(), config.http_port);
    tracing::info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(4 * 1024 * 1024))
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server terminated with error")
}

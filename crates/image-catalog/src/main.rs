//! Image Catalog Service
//!
//! REST API over the golden image catalog, plus the background refresh loop

use anyhow::{Context, Result};
use image_catalog::{
    create_router, storage::wait_until_ready, AppState, CatalogState, Config, HttpFetcher,
    Refresher, Storage,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Store readiness polling before the first refresh
const READY_ATTEMPTS: u32 = 30;
const READY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Image Catalog Service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded");
    info!("  Storage: {:?}", config.storage);
    info!("  API address: {}", config.api_address());
    info!("  Refresh interval: {}s", config.refresh_interval_secs);
    info!("  Fetch timeout: {}s", config.fetch_timeout_secs);

    let store = Arc::new(
        Storage::connect(&config)
            .await
            .context("Failed to initialize storage")?,
    );
    wait_until_ready(store.as_ref(), READY_ATTEMPTS, READY_DELAY)
        .await
        .context("Storage did not become ready")?;

    let fetcher = HttpFetcher::new(config.sources.clone(), config.fetch_timeout())
        .context("Failed to create image data fetcher")?;
    let refresher = Arc::new(Refresher::new(
        Arc::clone(&store),
        Arc::new(fetcher),
        Arc::new(CatalogState::new()),
        config.fetch_timeout(),
    ));

    let app = create_router(AppState::new(Arc::clone(&store), Arc::clone(&refresher)));

    let addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    info!("Image Catalog Service running on http://{}", addr);

    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {:#}", e);
        }
    });

    let refresh_task = tokio::spawn(
        Arc::clone(&refresher).run(config.refresh_interval(), !config.refresh_on_startup),
    );

    tokio::select! {
        _ = api_task => {
            error!("API task terminated unexpectedly");
        }
        _ = refresh_task => {
            error!("Refresh task terminated unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down Image Catalog Service");

    Ok(())
}

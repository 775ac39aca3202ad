//! Image Catalog Service
//!
//! Keeps a searchable catalog of golden images published by AWS, Azure and
//! Google, refreshed from their public listings on a fixed interval, and
//! answers "latest image" and lookup queries over it.

pub mod config;
pub mod fetcher;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod query;
pub mod refresh;
pub mod storage;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use fetcher::{Fetcher, HttpFetcher};
pub use handlers::AppState;
pub use query::QueryEngine;
pub use refresh::{CatalogState, RefreshOutcome, Refresher};
pub use storage::{CatalogStore, MemoryStore, RedisStore, Storage};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/latest", get(handlers::latest_all_handler))
        .route("/admin/refresh", post(handlers::refresh_handler))
        .route("/{provider}/latest", get(handlers::latest_handler))
        .route("/{provider}/versions", get(handlers::versions_handler))
        .route("/{provider}/images", get(handlers::list_images_handler))
        .route("/{provider}/images/{id}", get(handlers::get_image_handler))
        .route("/{provider}/match/{image_id}", get(handlers::match_handler))
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

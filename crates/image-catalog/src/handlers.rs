//! API request handlers for the Image Catalog

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use catalog_common::{AwsImage, AzureImage, Error, GoogleImage, Provider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    models::ListQuery,
    query::QueryEngine,
    refresh::{CatalogState, RefreshOutcome, Refresher},
    storage::{CatalogStore, Storage},
};

/// Shared application state
pub struct AppState {
    pub store: Arc<Storage>,
    pub engine: QueryEngine<Storage>,
    pub refresher: Arc<Refresher<Storage>>,
    pub state: Arc<CatalogState>,
}

impl AppState {
    /// Wire the engine and coordinator around one store
    pub fn new(store: Arc<Storage>, refresher: Arc<Refresher<Storage>>) -> Self {
        Self {
            engine: QueryEngine::new(Arc::clone(&store)),
            state: Arc::clone(refresher.state()),
            store,
            refresher,
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn not_found() -> Self {
        Error::NotFound.into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(error_body(self.status, &self.message))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::NotFound | Error::InvalidProvider(_) => StatusCode::NOT_FOUND,
            _ => {
                error!("Request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Value {
    serde_json::json!({
        "error": message,
        "code": status.as_u16()
    })
}

fn parse_provider(tag: &str) -> Result<Provider, ApiError> {
    tag.parse::<Provider>().map_err(ApiError::from)
}

/// Optional architecture filter for latest-image lookups
#[derive(Debug, Default, Deserialize)]
pub struct ArchQuery {
    pub arch: Option<String>,
}

/// Refresh times reported by `/status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    pub providers: BTreeMap<Provider, Option<chrono::DateTime<chrono::Utc>>>,
}

async fn status_snapshot(state: &CatalogState) -> StatusResponse {
    let mut providers = BTreeMap::new();
    for provider in Provider::ALL {
        providers.insert(provider, state.provider_refresh_time(provider).await);
    }

    StatusResponse {
        last_updated: state.last_refresh_time().await,
        providers,
    }
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let (status, storage) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            error!("Storage health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let last_updated = state.state.last_refresh_time().await;
    let body = serde_json::json!({
        "status": if status == StatusCode::OK { "healthy" } else { "degraded" },
        "service": "image-catalog",
        "storage": storage,
        "last_updated": last_updated,
    });

    (status, Json(body)).into_response()
}

/// Refresh times, globally and per provider
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(status_snapshot(&state.state).await)
}

/// Latest images for every provider; a provider without images reports the not-found payload
pub async fn latest_all_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let catalog = state.engine.latest_all().await?;

    fn or_not_found<T: Serialize>(resolved: Option<T>) -> Result<Value, ApiError> {
        match resolved {
            Some(value) => serde_json::to_value(value).map_err(|e| ApiError::from(Error::from(e))),
            None => Ok(error_body(StatusCode::NOT_FOUND, &Error::NotFound.to_string())),
        }
    }

    Ok(Json(serde_json::json!({
        "latest_aws_image": or_not_found(catalog.aws)?,
        "latest_azure_image": or_not_found(catalog.azure)?,
        "latest_google_image": or_not_found(catalog.google)?,
    })))
}

/// Latest image per architecture for one provider
pub async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<ArchQuery>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;

    let latest = state
        .engine
        .latest(provider, query.arch.as_deref())
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(latest).into_response())
}

/// Distinct versions, newest first
pub async fn versions_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let provider = parse_provider(&provider)?;
    Ok(Json(state.engine.versions(provider).await?))
}

/// Filtered, paginated listing
pub async fn list_images_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;

    let response = match provider {
        Provider::Aws => Json(state.engine.list::<AwsImage>(&query).await?).into_response(),
        Provider::Azure => Json(state.engine.list::<AzureImage>(&query).await?).into_response(),
        Provider::Google => Json(state.engine.list::<GoogleImage>(&query).await?).into_response(),
    };

    Ok(response)
}

/// Single image by provider-native identifier
pub async fn get_image_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;

    let response = match provider {
        Provider::Aws => state
            .engine
            .get::<AwsImage>(&id)
            .await?
            .map(|image| Json(image).into_response()),
        Provider::Azure => state
            .engine
            .get::<AzureImage>(&id)
            .await?
            .map(|image| Json(image).into_response()),
        Provider::Google => state
            .engine
            .get::<GoogleImage>(&id)
            .await?
            .map(|image| Json(image).into_response()),
    };

    response.ok_or_else(ApiError::not_found)
}

/// Same AWS image in every region.
///
/// Only AWS publishes per-region copies; other providers never match.
pub async fn match_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, image_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if parse_provider(&provider)? != Provider::Aws {
        return Err(ApiError::not_found());
    }

    let matching = state
        .engine
        .find_matching(&image_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(matching).into_response())
}

/// Run a refresh now, waiting for any refresh already in progress
pub async fn refresh_handler(State(state): State<Arc<AppState>>) -> Response {
    info!("Manual catalog refresh requested");

    let outcome = state.refresher.refresh().await;
    let status = match outcome {
        RefreshOutcome::Success => StatusCode::OK,
        RefreshOutcome::PartialFailure { .. } => StatusCode::BAD_GATEWAY,
    };

    (status, Json(outcome)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let not_found = ApiError::from(Error::NotFound);
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "No images found");

        let invalid = ApiError::from(Error::InvalidProvider("Gewitter".to_string()));
        assert_eq!(invalid.status, StatusCode::NOT_FOUND);
        assert_eq!(invalid.message, "Invalid cloud provider: Gewitter");

        let storage = ApiError::from(Error::Storage("connection refused".to_string()));
        assert_eq!(storage.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_shape() {
        assert_eq!(
            error_body(StatusCode::NOT_FOUND, "No images found"),
            serde_json::json!({ "error": "No images found", "code": 404 })
        );
    }
}

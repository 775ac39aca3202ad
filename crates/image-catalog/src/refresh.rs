//! Refresh coordinator
//!
//! Periodically rebuilds every provider's record set from its data source.
//! A provider whose fetch or ingestion fails keeps its previous generation;
//! the others still refresh.

use catalog_common::{AwsImage, AzureImage, Error, GoogleImage, Provider, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::fetcher::Fetcher;
use crate::ingest::{ingest, Adapter};
use crate::storage::CatalogStore;

#[derive(Debug, Default)]
struct Freshness {
    last_updated: Option<DateTime<Utc>>,
    providers: HashMap<Provider, DateTime<Utc>>,
}

/// Freshness of the catalog, shared between the coordinator and readers
#[derive(Debug, Default)]
pub struct CatalogState {
    inner: RwLock<Freshness>,
}

impl CatalogState {
    /// State of a catalog that has never been refreshed
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion time of the last refresh in which every provider succeeded
    pub async fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_updated
    }

    /// Commit time of the provider's current generation
    pub async fn provider_refresh_time(&self, provider: Provider) -> Option<DateTime<Utc>> {
        self.inner.read().await.providers.get(&provider).copied()
    }

    pub async fn mark_provider_refreshed(&self, provider: Provider, at: DateTime<Utc>) {
        self.inner.write().await.providers.insert(provider, at);
    }

    pub async fn mark_complete(&self, at: DateTime<Utc>) {
        self.inner.write().await.last_updated = Some(at);
    }
}

/// A provider that could not be refreshed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: Provider,
    pub error: String,
}

/// Result of one refresh invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Success,
    PartialFailure { failures: Vec<ProviderFailure> },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Success)
    }
}

/// Rebuilds the catalog from the data sources
pub struct Refresher<S> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher>,
    state: Arc<CatalogState>,
    fetch_timeout: Duration,
    /// Held for a whole invocation so refreshes never overlap
    in_flight: Mutex<()>,
}

impl<S: CatalogStore> Refresher<S> {
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<dyn Fetcher>,
        state: Arc<CatalogState>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            state,
            fetch_timeout,
            in_flight: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<CatalogState> {
        &self.state
    }

    /// Refresh every provider once.
    ///
    /// Waits for a refresh already in progress to finish first.
    pub async fn refresh(&self) -> RefreshOutcome {
        let _guard = self.in_flight.lock().await;
        let started = Instant::now();
        info!("Starting catalog refresh");

        let mut failures = Vec::new();
        for provider in Provider::ALL {
            if let Err(e) = self.refresh_provider(provider).await {
                error!("Failed to refresh {} images: {}", provider, e);
                failures.push(ProviderFailure {
                    provider,
                    error: e.to_string(),
                });
            }
        }

        if failures.is_empty() {
            self.state.mark_complete(Utc::now()).await;
            info!("Catalog refresh completed in {:?}", started.elapsed());
            RefreshOutcome::Success
        } else {
            error!(
                "Catalog refresh finished with {} failed provider(s) in {:?}",
                failures.len(),
                started.elapsed()
            );
            RefreshOutcome::PartialFailure { failures }
        }
    }

    async fn refresh_provider(&self, provider: Provider) -> Result<()> {
        match provider {
            Provider::Aws => self.replace_provider::<AwsImage>().await,
            Provider::Azure => self.replace_provider::<AzureImage>().await,
            Provider::Google => self.replace_provider::<GoogleImage>().await,
        }
    }

    async fn replace_provider<R: Adapter>(&self) -> Result<()> {
        let provider = R::PROVIDER;
        let started = Instant::now();

        let raw = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(provider))
            .await
            .map_err(|_| {
                Error::fetch(
                    provider,
                    format!("timed out after {}s", self.fetch_timeout.as_secs_f64()),
                )
            })??;

        let batch = ingest::<R>(raw);
        let stored = self.store.replace(batch.records).await?;
        self.state.mark_provider_refreshed(provider, Utc::now()).await;

        info!(
            "Refreshed {} images: {} stored, {} skipped in {:?}",
            provider,
            stored,
            batch.skipped,
            started.elapsed()
        );
        Ok(())
    }

    /// Refresh on a fixed interval until the task is dropped.
    ///
    /// The first tick fires immediately unless `skip_first` is set.
    pub async fn run(self: Arc<Self>, every: Duration, skip_first: bool) {
        info!("Starting refresh scheduler (every {} seconds)", every.as_secs());

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if skip_first {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            // Failures are logged per provider; the loop keeps going
            self.refresh().await;
        }
    }
}

//! Raw image data sources

use async_trait::async_trait;
use catalog_common::{Error, Provider, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::SourceUrls;

/// Source of raw provider records
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch every raw record published for a provider.
    ///
    /// Any failure is reported as [`Error::FetchFailure`].
    async fn fetch(&self, provider: Provider) -> Result<Vec<Value>>;
}

/// Fetches the published JSON documents over HTTP
pub struct HttpFetcher {
    client: reqwest::Client,
    sources: SourceUrls,
}

impl HttpFetcher {
    /// Create a fetcher with a request timeout
    pub fn new(sources: SourceUrls, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, sources })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, provider: Provider) -> Result<Vec<Value>> {
        let url = self.sources.url_for(provider);
        debug!("Fetching {} image data from {}", provider, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(provider, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::fetch(
                provider,
                format!("{} returned {}", url, response.status()),
            ));
        }

        // A `null` document is treated like an empty listing
        let records: Option<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| Error::fetch(provider, format!("invalid JSON body: {}", e)))?;

        Ok(records.unwrap_or_default())
    }
}

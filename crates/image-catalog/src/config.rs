//! Configuration management for the Image Catalog
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use catalog_common::Provider;
use std::env;
use std::time::Duration;

/// Default location of the published image data
pub const DEFAULT_IMAGE_DATA_BASE_URL: &str = "https://cloudx-json-bucket.s3.amazonaws.com/raw";

/// Which store backs the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    Memory,
}

/// Where each provider's raw image data is fetched from
#[derive(Debug, Clone)]
pub struct SourceUrls {
    pub aws: String,
    pub azure: String,
    pub google: String,
}

impl SourceUrls {
    /// Standard file layout under a base URL
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            aws: format!("{}/aws/aws.json", base),
            azure: format!("{}/azure/eastus.json", base),
            google: format!("{}/google/global.json", base),
        }
    }

    /// Source URL for one provider
    pub fn url_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::Aws => &self.aws,
            Provider::Azure => &self.azure,
            Provider::Google => &self.google,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Store backend
    pub storage: StorageBackend,

    /// Redis connection URL
    pub redis_url: String,

    /// Prefix for every Redis key the catalog writes
    pub redis_key_prefix: String,

    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Image data sources
    pub sources: SourceUrls,

    /// Interval between scheduled refreshes in seconds
    pub refresh_interval_secs: u64,

    /// Per-provider fetch timeout in seconds
    pub fetch_timeout_secs: u64,

    /// Run the first refresh immediately at startup
    pub refresh_on_startup: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let storage = match var("CATALOG_STORAGE", "redis").to_ascii_lowercase().as_str() {
            "redis" => StorageBackend::Redis,
            "memory" => StorageBackend::Memory,
            other => anyhow::bail!("Invalid CATALOG_STORAGE '{}' (expected redis/memory)", other),
        };

        let base_sources = SourceUrls::from_base(&var(
            "IMAGE_DATA_BASE_URL",
            DEFAULT_IMAGE_DATA_BASE_URL,
        ));

        let config = Config {
            storage,

            redis_url: var("REDIS_URL", "redis://127.0.0.1:6379"),

            redis_key_prefix: var("REDIS_KEY_PREFIX", "catalog"),

            api_host: var("API_HOST", "0.0.0.0"),

            api_port: var("API_PORT", "8080")
                .parse()
                .context("Invalid API_PORT")?,

            sources: SourceUrls {
                aws: lookup("AWS_IMAGE_DATA").unwrap_or(base_sources.aws),
                azure: lookup("AZURE_IMAGE_DATA").unwrap_or(base_sources.azure),
                google: lookup("GCP_IMAGE_DATA").unwrap_or(base_sources.google),
            },

            refresh_interval_secs: var("REFRESH_INTERVAL_SECS", "86400")
                .parse()
                .context("Invalid REFRESH_INTERVAL_SECS")?,

            fetch_timeout_secs: var("FETCH_TIMEOUT_SECS", "60")
                .parse()
                .context("Invalid FETCH_TIMEOUT_SECS")?,

            refresh_on_startup: var("REFRESH_ON_STARTUP", "true")
                .parse()
                .context("Invalid REFRESH_ON_STARTUP (expected true/false)")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.refresh_interval_secs == 0 {
            anyhow::bail!("REFRESH_INTERVAL_SECS must be greater than 0");
        }

        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("FETCH_TIMEOUT_SECS must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

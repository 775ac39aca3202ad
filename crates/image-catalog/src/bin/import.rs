//! Catalog import utility
//!
//! Commands:
//! - file: load one provider's records from a local JSON listing
//! - populate: run a single full refresh against the configured sources

use anyhow::{bail, Context, Result};
use catalog_common::{AwsImage, AzureImage, GoogleImage, Provider};
use clap::{Parser, Subcommand};
use image_catalog::{
    ingest::{ingest, read_listing, Adapter},
    storage::wait_until_ready,
    CatalogState, CatalogStore, Config, HttpFetcher, RefreshOutcome, Refresher, Storage,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "catalog-import")]
#[command(about = "Load image data into the catalog store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace one provider's records with a local JSON listing
    File {
        /// Provider tag (aws, azure, google)
        provider: String,

        /// Path to a JSON array of raw records
        path: PathBuf,
    },

    /// Refresh every provider from the configured sources once
    Populate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,image_catalog=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let store = Arc::new(
        Storage::connect(&config)
            .await
            .context("Failed to initialize storage")?,
    );
    wait_until_ready(store.as_ref(), 10, Duration::from_secs(2))
        .await
        .context("Storage did not become ready")?;

    match cli.command {
        Commands::File { provider, path } => {
            let provider: Provider = provider.parse()?;
            import_file(store.as_ref(), provider, &path).await?
        }
        Commands::Populate => populate(store, &config).await?,
    }

    Ok(())
}

async fn import_file(store: &Storage, provider: Provider, path: &Path) -> Result<()> {
    let raw = read_listing(path).with_context(|| format!("Failed to load {}", path.display()))?;

    info!("Importing {} {} records from {}", raw.len(), provider, path.display());

    let stored = match provider {
        Provider::Aws => replace::<AwsImage>(store, raw).await?,
        Provider::Azure => replace::<AzureImage>(store, raw).await?,
        Provider::Google => replace::<GoogleImage>(store, raw).await?,
    };

    info!("Stored {} {} records", stored, provider);
    Ok(())
}

async fn replace<R: Adapter>(store: &Storage, raw: Vec<Value>) -> Result<usize> {
    let batch = ingest::<R>(raw);
    if batch.skipped > 0 {
        info!("Skipped {} malformed or duplicate records", batch.skipped);
    }
    Ok(store.replace(batch.records).await?)
}

async fn populate(store: Arc<Storage>, config: &Config) -> Result<()> {
    let fetcher = HttpFetcher::new(config.sources.clone(), config.fetch_timeout())?;
    let refresher = Refresher::new(
        store,
        Arc::new(fetcher),
        Arc::new(CatalogState::new()),
        config.fetch_timeout(),
    );

    match refresher.refresh().await {
        RefreshOutcome::Success => {
            info!("Catalog populated");
            Ok(())
        }
        RefreshOutcome::PartialFailure { failures } => {
            for failure in &failures {
                error!("{}: {}", failure.provider, failure.error);
            }
            bail!("{} provider(s) failed to refresh", failures.len())
        }
    }
}

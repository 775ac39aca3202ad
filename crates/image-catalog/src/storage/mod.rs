//! Catalog storage
//!
//! One record collection per provider. Reads are predicate-filtered,
//! optionally ordered by recency and paginated; writes replace a provider's
//! whole generation at once. A reader sees either the previous generation or
//! the next one in full, never a mix.

mod memory;
mod redis_store;

use async_trait::async_trait;
use catalog_common::{CatalogRecord, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, StorageBackend};

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// Equality and substring predicates over the common record attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Case-sensitive substring of the name
    pub name_contains: Option<String>,
    pub arch: Option<String>,
    pub version: Option<String>,
    /// Never matches records of providers without regions
    pub region: Option<String>,
}

impl RecordFilter {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Whether a record satisfies every predicate that is set
    pub fn matches<R: CatalogRecord>(&self, record: &R) -> bool {
        fn eq(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().map_or(true, |e| e == actual)
        }

        eq(&self.id, record.id())
            && eq(&self.name, record.name())
            && eq(&self.arch, record.arch())
            && eq(&self.version, record.version())
            && self
                .name_contains
                .as_deref()
                .map_or(true, |needle| record.name().contains(needle))
            && self
                .region
                .as_deref()
                .map_or(true, |region| record.region() == Some(region))
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Order in which the generation was inserted
    #[default]
    Stored,
    /// Most recent freshness timestamp first, undated records last
    NewestFirst,
}

/// A filtered, ordered window over one provider's records
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub filter: RecordFilter,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Selection {
    /// Every record matching `filter`, in stored order
    pub fn all(filter: RecordFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// First record matching `filter`, in stored order
    pub fn first(filter: RecordFilter) -> Self {
        Self {
            filter,
            limit: Some(1),
            ..Default::default()
        }
    }
}

/// Apply a selection to an in-memory generation
pub(crate) fn select_from<R: CatalogRecord>(records: &[R], selection: &Selection) -> Vec<R> {
    let mut matched: Vec<&R> = records
        .iter()
        .filter(|record| selection.filter.matches(*record))
        .collect();

    if selection.order == SortOrder::NewestFirst {
        // Stable sort keeps stored order among equal timestamps
        matched.sort_by(|a, b| b.freshness().cmp(&a.freshness()));
    }

    matched
        .into_iter()
        .skip(selection.offset)
        .take(selection.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

/// Per-provider record collections
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    /// Replace the provider's whole generation with `records` as one unit.
    ///
    /// Returns the number of records stored.
    async fn replace<R: CatalogRecord>(&self, records: Vec<R>) -> Result<usize>;

    /// The provider's current generation, in stored order.
    ///
    /// A snapshot is never affected by later replacements, so a query that
    /// needs several passes over the records runs them all on one snapshot.
    async fn snapshot<R: CatalogRecord>(&self) -> Result<Arc<Vec<R>>>;

    /// Read the records covered by `selection`
    async fn select<R: CatalogRecord>(&self, selection: &Selection) -> Result<Vec<R>> {
        let records = self.snapshot::<R>().await?;
        Ok(select_from(records.as_slice(), selection))
    }

    /// Count the records matching `filter`
    async fn count<R: CatalogRecord>(&self, filter: &RecordFilter) -> Result<usize> {
        let records = self.snapshot::<R>().await?;
        Ok(records.iter().filter(|record| filter.matches(*record)).count())
    }

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Store selected by configuration
pub enum Storage {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl Storage {
    /// Open the configured backend
    pub async fn connect(config: &Config) -> Result<Self> {
        match config.storage {
            StorageBackend::Memory => Ok(Storage::Memory(MemoryStore::new())),
            StorageBackend::Redis => Ok(Storage::Redis(
                RedisStore::new(&config.redis_url, &config.redis_key_prefix).await?,
            )),
        }
    }
}

#[async_trait]
impl CatalogStore for Storage {
    async fn replace<R: CatalogRecord>(&self, records: Vec<R>) -> Result<usize> {
        match self {
            Storage::Memory(store) => store.replace(records).await,
            Storage::Redis(store) => store.replace(records).await,
        }
    }

    async fn snapshot<R: CatalogRecord>(&self) -> Result<Arc<Vec<R>>> {
        match self {
            Storage::Memory(store) => store.snapshot().await,
            Storage::Redis(store) => store.snapshot().await,
        }
    }

    async fn health_check(&self) -> Result<()> {
        match self {
            Storage::Memory(store) => store.health_check().await,
            Storage::Redis(store) => store.health_check().await,
        }
    }
}

/// Poll the store's health check until it answers or `attempts` run out
pub async fn wait_until_ready<S: CatalogStore>(store: &S, attempts: u32, delay: Duration) -> Result<()> {
    let mut attempt = 1;
    loop {
        match store.health_check().await {
            Ok(()) => {
                info!("Store is ready");
                return Ok(());
            }
            Err(e) if attempt < attempts => {
                warn!("Store not ready (attempt {}/{}): {}", attempt, attempts, e);
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_common::{AwsImage, AzureImage};
    use chrono::{TimeZone, Utc};

    fn aws(id: &str, name: &str, region: &str, day: Option<u32>) -> AwsImage {
        let date = day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap());
        AwsImage::new(id, name, "x86_64", "9.2.0", region, date)
    }

    #[test]
    fn test_filter_matches() {
        let image = aws("ami-a", "RHEL-9.2.0_HVM", "us-east-1", Some(1));

        assert!(RecordFilter::default().matches(&image));
        assert!(RecordFilter::default().arch("x86_64").region("us-east-1").matches(&image));
        assert!(!RecordFilter::default().arch("X86_64").matches(&image));
        assert!(!RecordFilter::default().region("us-west-2").matches(&image));

        let contains = RecordFilter {
            name_contains: Some("9.2".to_string()),
            ..Default::default()
        };
        assert!(contains.matches(&image));

        let lowercase = RecordFilter {
            name_contains: Some("rhel".to_string()),
            ..Default::default()
        };
        assert!(!lowercase.matches(&image));
    }

    #[test]
    fn test_region_filter_never_matches_regionless_records() {
        let image = AzureImage {
            id: "urn-a".to_string(),
            urn: "urn-a".to_string(),
            sku: "sku-a".to_string(),
            offer: "RHEL".to_string(),
            publisher: "RedHat".to_string(),
            arch: "x64".to_string(),
            version: "9.5.2023122216".to_string(),
            build_date: None,
        };

        assert!(!RecordFilter::default().region("eastus").matches(&image));
    }

    #[test]
    fn test_select_newest_first_is_stable() {
        let records = vec![
            aws("ami-a", "a", "us-east-1", Some(1)),
            aws("ami-b", "b", "us-east-1", None),
            aws("ami-c", "c", "us-east-1", Some(3)),
            aws("ami-d", "d", "us-east-1", Some(3)),
        ];

        let selection = Selection {
            order: SortOrder::NewestFirst,
            ..Default::default()
        };
        let ids: Vec<String> = select_from(&records, &selection)
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ids, vec!["ami-c", "ami-d", "ami-a", "ami-b"]);
    }

    #[tokio::test]
    async fn test_wait_until_ready() {
        let store = MemoryStore::new();
        wait_until_ready(&store, 1, Duration::from_millis(1)).await.unwrap();
    }

    #[test]
    fn test_select_window() {
        let records: Vec<AwsImage> = (1..=5)
            .map(|d| aws(&format!("ami-{}", d), "n", "us-east-1", Some(d)))
            .collect();

        let selection = Selection {
            offset: 1,
            limit: Some(2),
            ..Default::default()
        };
        let ids: Vec<String> = select_from(&records, &selection)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["ami-2", "ami-3"]);

        let first = select_from(&records, &Selection::first(RecordFilter::default().name("n")));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "ami-1");

        let beyond = Selection {
            offset: 10,
            ..Default::default()
        };
        assert!(select_from(&records, &beyond).is_empty());
    }
}

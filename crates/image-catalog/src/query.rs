//! Query engine
//!
//! Latest-image resolution, cross-region matching, version enumeration and
//! paginated listing on top of a [`CatalogStore`]. Lookups that find nothing
//! return `None`; an empty collection is a real answer.
//!
//! Every operation reads one snapshot of the provider's generation and does
//! all of its passes over it, so a refresh committing mid-query never mixes
//! two generations into one answer.

use catalog_common::version::{sort_descending, truncate_azure_version};
use catalog_common::{
    compare_versions, AwsImage, AzureImage, CatalogRecord, GoogleImage, Provider, Result,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::models::{
    LatestAwsImage, LatestCatalog, LatestImages, ListQuery, MatchingImages, Page, RegionImage,
};
use crate::storage::{select_from, CatalogStore, RecordFilter, Selection, SortOrder};

/// Marker for AWS pre-release images, matched case-insensitively
const BETA_MARKER: &str = "beta";

fn is_beta(image: &AwsImage) -> bool {
    image.name.to_ascii_lowercase().contains(BETA_MARKER)
}

/// Greatest version wins, then the most recent timestamp
fn newer<R: CatalogRecord>(candidate: &R, current: &R) -> bool {
    compare_versions(candidate.version(), current.version())
        .then_with(|| candidate.freshness().cmp(&current.freshness()))
        == Ordering::Greater
}

/// Winner per architecture among records not rejected by `exclude`.
///
/// Equal candidates keep the one seen first in stored order.
fn latest_per_arch<'a, R, F>(records: &'a [R], arch: Option<&str>, exclude: F) -> BTreeMap<String, &'a R>
where
    R: CatalogRecord,
    F: Fn(&R) -> bool,
{
    let mut winners: BTreeMap<String, &R> = BTreeMap::new();
    for record in records {
        if arch.is_some_and(|arch| arch != record.arch()) || exclude(record) {
            continue;
        }
        match winners.get(record.arch()) {
            Some(current) if !newer(record, *current) => {}
            _ => {
                winners.insert(record.arch().to_string(), record);
            }
        }
    }
    winners
}

/// Read-only queries over the catalog
pub struct QueryEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for QueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CatalogStore> QueryEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn latest_plain<R: CatalogRecord>(&self, arch: Option<&str>) -> Result<Option<BTreeMap<String, R>>> {
        let records = self.store.snapshot::<R>().await?;
        let winners: BTreeMap<String, R> = latest_per_arch(records.as_slice(), arch, |_| false)
            .into_iter()
            .map(|(arch, record)| (arch, record.clone()))
            .collect();
        Ok((!winners.is_empty()).then_some(winners))
    }

    /// Latest AWS image per architecture with its regional copies
    pub async fn latest_aws(
        &self,
        arch: Option<&str>,
    ) -> Result<Option<BTreeMap<String, LatestAwsImage>>> {
        let records = self.store.snapshot::<AwsImage>().await?;
        let winners = latest_per_arch(records.as_slice(), arch, is_beta);
        if winners.is_empty() {
            return Ok(None);
        }

        let mut latest = BTreeMap::new();
        for (arch, winner) in winners {
            // First copy per region in stored order; regions without a copy stay absent
            let mut amis = BTreeMap::new();
            for copy in records
                .iter()
                .filter(|copy| copy.name == winner.name && copy.arch == arch)
            {
                amis.entry(copy.region.clone())
                    .or_insert_with(|| copy.image_id.clone());
            }

            debug!(
                "Latest AWS image for {}: {} in {} regions",
                arch,
                winner.name,
                amis.len()
            );

            latest.insert(
                arch,
                LatestAwsImage {
                    name: winner.name.clone(),
                    arch: winner.arch.clone(),
                    version: winner.version.clone(),
                    date: winner.date,
                    amis,
                },
            );
        }

        Ok(Some(latest))
    }

    /// Latest Azure image per architecture
    pub async fn latest_azure(&self, arch: Option<&str>) -> Result<Option<BTreeMap<String, AzureImage>>> {
        self.latest_plain(arch).await
    }

    /// Latest Google image per architecture
    pub async fn latest_google(
        &self,
        arch: Option<&str>,
    ) -> Result<Option<BTreeMap<String, GoogleImage>>> {
        self.latest_plain(arch).await
    }

    /// Latest images for any provider
    pub async fn latest(&self, provider: Provider, arch: Option<&str>) -> Result<Option<LatestImages>> {
        Ok(match provider {
            Provider::Aws => self.latest_aws(arch).await?.map(LatestImages::Aws),
            Provider::Azure => self.latest_azure(arch).await?.map(LatestImages::Azure),
            Provider::Google => self.latest_google(arch).await?.map(LatestImages::Google),
        })
    }

    /// Latest images for every provider at once
    pub async fn latest_all(&self) -> Result<LatestCatalog> {
        Ok(LatestCatalog {
            aws: self.latest_aws(None).await?,
            azure: self.latest_azure(None).await?,
            google: self.latest_google(None).await?,
        })
    }

    /// AWS images in every region sharing the name of `image_id`.
    ///
    /// Results keep the store's order.
    pub async fn find_matching(&self, image_id: &str) -> Result<Option<MatchingImages>> {
        let records = self.store.snapshot::<AwsImage>().await?;

        let Some(image) = records.iter().find(|record| record.id == image_id) else {
            return Ok(None);
        };

        let matching_images = records
            .iter()
            .filter(|copy| copy.name == image.name)
            .map(|copy| RegionImage {
                region: copy.region.clone(),
                id: copy.image_id.clone(),
            })
            .collect();

        Ok(Some(MatchingImages {
            image_id: image_id.to_string(),
            name: image.name.clone(),
            matching_images,
        }))
    }

    async fn distinct_versions<R: CatalogRecord>(&self, normalize: fn(&str) -> String) -> Result<Vec<String>> {
        let records = self.store.snapshot::<R>().await?;

        let distinct: BTreeSet<String> = records.iter().map(|r| normalize(r.version())).collect();
        let mut versions: Vec<String> = distinct.into_iter().collect();
        sort_descending(&mut versions);

        Ok(versions)
    }

    /// Distinct versions, newest first.
    ///
    /// Azure versions lose their build component first, so `9.5.2023122216`
    /// and `9.5.2024010112` both count as `9.5`.
    pub async fn versions(&self, provider: Provider) -> Result<Vec<String>> {
        match provider {
            Provider::Aws => self.distinct_versions::<AwsImage>(str::to_string).await,
            Provider::Azure => self.distinct_versions::<AzureImage>(truncate_azure_version).await,
            Provider::Google => self.distinct_versions::<GoogleImage>(str::to_string).await,
        }
    }

    /// Filtered listing, most recent first
    pub async fn list<R: CatalogRecord>(&self, query: &ListQuery) -> Result<Page<R>> {
        let page = query.page();
        let page_size = query.page_size();
        let filter = query.filter();

        let records = self.store.snapshot::<R>().await?;
        let total_count = records.iter().filter(|record| filter.matches(*record)).count();

        let selection = Selection {
            filter,
            order: SortOrder::NewestFirst,
            offset: (page - 1).saturating_mul(page_size),
            limit: Some(page_size),
        };
        let results = select_from(records.as_slice(), &selection);

        Ok(Page::new(results, page, page_size, total_count))
    }

    /// Single record by provider-native identifier
    pub async fn get<R: CatalogRecord>(&self, id: &str) -> Result<Option<R>> {
        let found: Vec<R> = self
            .store
            .select(&Selection::first(RecordFilter::default().id(id)))
            .await?;
        Ok(found.into_iter().next())
    }
}

//! Query inputs and results

use catalog_common::{AzureImage, GoogleImage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::storage::RecordFilter;

/// Page size used when the caller does not pass one
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Latest AWS image for one architecture, with its copy in every region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestAwsImage {
    pub name: String,
    pub arch: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Region → per-region image identifier
    pub amis: BTreeMap<String, String>,
}

/// Latest image per architecture for one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LatestImages {
    Aws(BTreeMap<String, LatestAwsImage>),
    Azure(BTreeMap<String, AzureImage>),
    Google(BTreeMap<String, GoogleImage>),
}

/// Latest resolution for every provider; `None` where a provider has no images
#[derive(Debug, Clone, PartialEq)]
pub struct LatestCatalog {
    pub aws: Option<BTreeMap<String, LatestAwsImage>>,
    pub azure: Option<BTreeMap<String, AzureImage>>,
    pub google: Option<BTreeMap<String, GoogleImage>>,
}

/// One regional copy of an AWS image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionImage {
    pub region: String,
    pub id: String,
}

/// AWS images sharing a name across regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingImages {
    /// Identifier the lookup started from
    pub image_id: String,
    pub name: String,
    pub matching_images: Vec<RegionImage>,
}

/// Filters and window for a paginated listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub arch: Option<String>,
    pub version: Option<String>,
    pub region: Option<String>,
    /// Provider-native identifier
    pub id: Option<String>,
    /// Substring of the name
    pub name: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListQuery {
    /// Effective page number, at least 1
    pub fn page(&self) -> usize {
        clamp_positive(self.page, 1)
    }

    /// Effective page size, at least 1
    pub fn page_size(&self) -> usize {
        clamp_positive(self.page_size, DEFAULT_PAGE_SIZE)
    }

    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            id: self.id.clone(),
            name: None,
            name_contains: self.name.clone(),
            arch: self.arch.clone(),
            version: self.version.clone(),
            region: self.region.clone(),
        }
    }
}

fn clamp_positive(value: Option<i64>, default: usize) -> usize {
    match value {
        None => default,
        Some(v) if v < 1 => 1,
        Some(v) => usize::try_from(v).unwrap_or(usize::MAX),
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    /// Matching records before pagination
    pub total_count: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, page: usize, page_size: usize, total_count: usize) -> Self {
        Self {
            results,
            page,
            page_size,
            total_count,
            total_pages: total_count.div_ceil(page_size),
        }
    }
}

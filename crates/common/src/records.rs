//! Normalized image records
//!
//! One record type per provider. Records are produced by ingestion, stored
//! as a whole generation and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Attributes shared by every provider's records.
///
/// Architecture labels are compared exactly; casing differs between
/// providers (`x86_64`, `X86_64`, `x64`) and is deliberately left alone.
pub trait CatalogRecord:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Provider this record type belongs to
    const PROVIDER: Provider;

    /// Provider-native unique identifier
    fn id(&self) -> &str;

    /// Human-readable name (Azure: the SKU)
    fn name(&self) -> &str;

    /// CPU architecture label as published
    fn arch(&self) -> &str;

    /// Normalized version string
    fn version(&self) -> &str;

    /// Region, for providers that publish per-region images
    fn region(&self) -> Option<&str> {
        None
    }

    /// Creation or build timestamp used to order by recency
    fn freshness(&self) -> Option<DateTime<Utc>>;
}

/// AWS machine image (one per region)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsImage {
    /// Unique identifier (the AMI id)
    pub id: String,

    /// Image name, shared by the copies of one image across regions
    pub name: String,

    /// Architecture (`x86_64`, `arm64`)
    pub arch: String,

    /// Version extracted from the name
    pub version: String,

    /// Per-region image identifier
    pub image_id: String,

    /// Region the image lives in
    pub region: String,

    /// Creation date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,

    /// Scheduled deprecation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub virt: Option<String>,

    /// Image owner alias
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_operation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Passed through as published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_device_mappings: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ena_support: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_device_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_device_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sriov_net_support: Option<String>,
}

impl AwsImage {
    /// Minimal record; descriptive metadata left empty
    pub fn new(
        image_id: impl Into<String>,
        name: impl Into<String>,
        arch: impl Into<String>,
        version: impl Into<String>,
        region: impl Into<String>,
        date: Option<DateTime<Utc>>,
    ) -> Self {
        let image_id = image_id.into();
        Self {
            id: image_id.clone(),
            name: name.into(),
            arch: arch.into(),
            version: version.into(),
            image_id,
            region: region.into(),
            date,
            deprecation_time: None,
            virt: None,
            provider: None,
            description: None,
            image_location: None,
            image_type: None,
            public: None,
            owner_id: None,
            platform_details: None,
            usage_operation: None,
            state: None,
            block_device_mappings: None,
            ena_support: None,
            hypervisor: None,
            root_device_name: None,
            root_device_type: None,
            sriov_net_support: None,
        }
    }
}

impl CatalogRecord for AwsImage {
    const PROVIDER: Provider = Provider::Aws;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn region(&self) -> Option<&str> {
        Some(&self.region)
    }

    fn freshness(&self) -> Option<DateTime<Utc>> {
        self.date
    }
}

/// Azure marketplace image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureImage {
    /// Unique identifier (the URN)
    pub id: String,

    /// `publisher:offer:sku:version`
    pub urn: String,

    pub sku: String,

    pub offer: String,

    pub publisher: String,

    /// Architecture (`x64`, `Arm64`)
    pub arch: String,

    /// Raw dotted build string, e.g. `7.9.2023122216`
    pub version: String,

    /// Build timestamp decoded from the version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<DateTime<Utc>>,
}

impl CatalogRecord for AzureImage {
    const PROVIDER: Provider = Provider::Azure;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.sku
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn freshness(&self) -> Option<DateTime<Utc>> {
        self.build_date
    }
}

/// Google Compute Engine image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleImage {
    pub id: String,

    pub name: String,

    /// Architecture (`X86_64`, `ARM64`)
    pub arch: String,

    /// Version extracted from the name
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_fingerprint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    // Opaque pass-throughs, never interpreted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_os_features: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_codes: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub licenses: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_disk: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_locations: Option<serde_json::Value>,
}

impl GoogleImage {
    /// Minimal record; extended metadata left empty
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arch: impl Into<String>,
        version: impl Into<String>,
        creation_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arch: arch.into(),
            version: version.into(),
            creation_timestamp,
            description: None,
            disk_size_gb: None,
            family: None,
            kind: None,
            label_fingerprint: None,
            self_link: None,
            source_type: None,
            status: None,
            guest_os_features: None,
            license_codes: None,
            licenses: None,
            raw_disk: None,
            storage_locations: None,
        }
    }
}

impl CatalogRecord for GoogleImage {
    const PROVIDER: Provider = Provider::Google;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn freshness(&self) -> Option<DateTime<Utc>> {
        self.creation_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_aws_region_and_freshness() {
        let date = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let image = AwsImage::new("ami-a", "test_image", "x86_64", "1.0", "us-west-1", Some(date));

        assert_eq!(image.id(), "ami-a");
        assert_eq!(image.image_id, "ami-a");
        assert_eq!(CatalogRecord::region(&image), Some("us-west-1"));
        assert_eq!(image.freshness(), Some(date));
    }

    #[test]
    fn test_azure_name_is_sku() {
        let image = AzureImage {
            id: "urn-a".to_string(),
            urn: "urn-a".to_string(),
            sku: "sku-a".to_string(),
            offer: "offer-a".to_string(),
            publisher: "RedHat".to_string(),
            arch: "x64".to_string(),
            version: "1.0".to_string(),
            build_date: None,
        };

        assert_eq!(image.name(), "sku-a");
        assert_eq!(CatalogRecord::region(&image), None);
    }

    #[test]
    fn test_optional_fields_skipped_when_serialized() {
        let image = GoogleImage::new("1", "rhel-9-v20240515", "X86_64", "9", None);
        let json = serde_json::to_value(&image).unwrap();

        assert_eq!(json["name"], "rhel-9-v20240515");
        assert!(json.get("creation_timestamp").is_none());
        assert!(json.get("license_codes").is_none());
    }
}

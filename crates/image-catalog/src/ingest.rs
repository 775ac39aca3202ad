//! Ingestion adapters
//!
//! Turn raw provider JSON into normalized records. Adapters are pure: they
//! never touch the store, and a bad record only costs that record.
//!
//! A record is skipped when its identifier cannot be determined, when it is
//! not a JSON object, or when a field has the wrong JSON type. Timestamps
//! that cannot be parsed are dropped, not fatal.

use catalog_common::version::{extract_aws_version, extract_google_version};
use catalog_common::{AwsImage, AzureImage, CatalogRecord, Error, GoogleImage, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Conversion from one raw provider record
pub trait Adapter: CatalogRecord + Sized {
    fn adapt(raw: Value) -> Result<Self>;
}

/// Normalized output of one adapter run
#[derive(Debug)]
pub struct Batch<R> {
    pub records: Vec<R>,
    pub skipped: usize,
}

/// Run the adapter for `R` over a raw listing.
///
/// Keeps the first record for each identifier so a batch never violates
/// per-provider uniqueness.
pub fn ingest<R: Adapter>(raw: Vec<Value>) -> Batch<R> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for (index, value) in raw.into_iter().enumerate() {
        match R::adapt(value) {
            Ok(record) => {
                if seen.insert(record.id().to_string()) {
                    records.push(record);
                } else {
                    warn!(
                        "Skipping duplicate {} record {} at index {}",
                        R::PROVIDER,
                        record.id(),
                        index
                    );
                    skipped += 1;
                }
            }
            Err(e) => {
                warn!("Skipping record at index {}: {}", index, e);
                skipped += 1;
            }
        }
    }

    Batch { records, skipped }
}

/// Read a raw listing from a local JSON file; a `null` document reads as empty
pub fn read_listing(path: &Path) -> Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Other(anyhow::Error::new(e).context(format!("Failed to read {}", path.display())))
    })?;
    let listing: Option<Vec<Value>> = serde_json::from_str(&contents)?;
    Ok(listing.unwrap_or_default())
}

/// Identifier from a string or number field
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the date formats the providers publish
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp_field(
    record: &str,
    field: &str,
    raw: Option<&str>,
) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        debug!("Unparsable {} '{}' on record {}", field, raw, record);
    }
    parsed
}

/// Decode the build timestamp from an Azure version (`7.9.2023122216`)
pub fn azure_build_timestamp(version: &str) -> Option<DateTime<Utc>> {
    let build = version.split('.').nth(2)?;
    if !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (date, hour) = match build.len() {
        10 => (&build[..8], build[8..].parse::<u32>().ok()?),
        8 => (build, 0),
        _ => return None,
    };

    NaiveDate::parse_from_str(date, "%Y%m%d")
        .ok()?
        .and_hms_opt(hour, 0, 0)
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAwsImage {
    image_id: Option<Value>,
    name: Option<String>,
    architecture: Option<String>,
    region: Option<String>,
    creation_date: Option<String>,
    deprecation_time: Option<String>,
    virtualization_type: Option<String>,
    image_owner_alias: Option<String>,
    description: Option<String>,
    image_location: Option<String>,
    image_type: Option<String>,
    public: Option<bool>,
    owner_id: Option<String>,
    platform_details: Option<String>,
    usage_operation: Option<String>,
    state: Option<String>,
    block_device_mappings: Option<Value>,
    ena_support: Option<bool>,
    hypervisor: Option<String>,
    root_device_name: Option<String>,
    root_device_type: Option<String>,
    sriov_net_support: Option<String>,
}

impl Adapter for AwsImage {
    fn adapt(raw: Value) -> Result<Self> {
        let raw: RawAwsImage =
            serde_json::from_value(raw).map_err(|e| Error::malformed(Self::PROVIDER, e.to_string()))?;

        let id = identifier(raw.image_id.as_ref())
            .ok_or_else(|| Error::malformed(Self::PROVIDER, "missing ImageId"))?;
        let name = raw.name.unwrap_or_default();

        Ok(AwsImage {
            version: extract_aws_version(&name),
            date: timestamp_field(&id, "CreationDate", raw.creation_date.as_deref()),
            deprecation_time: timestamp_field(&id, "DeprecationTime", raw.deprecation_time.as_deref()),
            image_id: id.clone(),
            id,
            name,
            arch: raw.architecture.unwrap_or_default(),
            region: raw.region.unwrap_or_default(),
            virt: raw.virtualization_type,
            provider: raw.image_owner_alias,
            description: raw.description,
            image_location: raw.image_location,
            image_type: raw.image_type,
            public: raw.public,
            owner_id: raw.owner_id,
            platform_details: raw.platform_details,
            usage_operation: raw.usage_operation,
            state: raw.state,
            block_device_mappings: raw.block_device_mappings,
            ena_support: raw.ena_support,
            hypervisor: raw.hypervisor,
            root_device_name: raw.root_device_name,
            root_device_type: raw.root_device_type,
            sriov_net_support: raw.sriov_net_support,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawAzureImage {
    urn: Option<Value>,
    architecture: Option<String>,
    offer: Option<String>,
    publisher: Option<String>,
    sku: Option<String>,
    version: Option<String>,
}

impl Adapter for AzureImage {
    fn adapt(raw: Value) -> Result<Self> {
        let raw: RawAzureImage =
            serde_json::from_value(raw).map_err(|e| Error::malformed(Self::PROVIDER, e.to_string()))?;

        let urn = identifier(raw.urn.as_ref())
            .ok_or_else(|| Error::malformed(Self::PROVIDER, "missing urn"))?;
        let version = raw.version.unwrap_or_default();

        Ok(AzureImage {
            id: urn.clone(),
            urn,
            sku: raw.sku.unwrap_or_default(),
            offer: raw.offer.unwrap_or_default(),
            publisher: raw.publisher.unwrap_or_default(),
            arch: raw.architecture.unwrap_or_default(),
            build_date: azure_build_timestamp(&version),
            version,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGoogleImage {
    id: Option<Value>,
    name: Option<String>,
    architecture: Option<String>,
    creation_timestamp: Option<String>,
    description: Option<String>,
    disk_size_gb: Option<Value>,
    family: Option<String>,
    kind: Option<String>,
    label_fingerprint: Option<String>,
    self_link: Option<String>,
    source_type: Option<String>,
    status: Option<String>,
    guest_os_features: Option<Value>,
    license_codes: Option<Value>,
    licenses: Option<Value>,
    raw_disk: Option<Value>,
    storage_locations: Option<Value>,
}

impl Adapter for GoogleImage {
    fn adapt(raw: Value) -> Result<Self> {
        let raw: RawGoogleImage =
            serde_json::from_value(raw).map_err(|e| Error::malformed(Self::PROVIDER, e.to_string()))?;

        let id = identifier(raw.id.as_ref())
            .ok_or_else(|| Error::malformed(Self::PROVIDER, "missing id"))?;
        let name = raw.name.unwrap_or_default();

        Ok(GoogleImage {
            version: extract_google_version(&name),
            creation_timestamp: timestamp_field(
                &id,
                "creationTimestamp",
                raw.creation_timestamp.as_deref(),
            ),
            id,
            name,
            arch: raw.architecture.unwrap_or_default(),
            description: raw.description,
            // Published as a string, occasionally as a number
            disk_size_gb: identifier(raw.disk_size_gb.as_ref()),
            family: raw.family,
            kind: raw.kind,
            label_fingerprint: raw.label_fingerprint,
            self_link: raw.self_link,
            source_type: raw.source_type,
            status: raw.status,
            guest_os_features: raw.guest_os_features,
            license_codes: raw.license_codes,
            licenses: raw.licenses,
            raw_disk: raw.raw_disk,
            storage_locations: raw.storage_locations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 15, 12, 34, 56).unwrap();
        assert_eq!(parse_timestamp("2023-11-15T12:34:56.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-15T12:34:56"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-15T10:23:45.000-07:00"),
            Some(Utc.with_ymd_and_hms(2024, 5, 15, 17, 23, 45).unwrap())
        );
        assert_eq!(
            parse_timestamp("2022-01-01"),
            Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_azure_build_timestamp() {
        assert_eq!(
            azure_build_timestamp("7.9.2023122216"),
            Some(Utc.with_ymd_and_hms(2023, 12, 22, 16, 0, 0).unwrap())
        );
        assert_eq!(
            azure_build_timestamp("9.4.20240607"),
            Some(Utc.with_ymd_and_hms(2024, 6, 7, 0, 0, 0).unwrap())
        );
        assert_eq!(azure_build_timestamp("9.4"), None);
        assert_eq!(azure_build_timestamp("9.4.latest"), None);
        assert_eq!(azure_build_timestamp("9.4.2024139999"), None);
    }

    #[test]
    fn test_adapt_aws_record() {
        let raw = json!({
            "ImageId": "ami-0123",
            "Name": "RHEL-9.2.0_HVM-20231115-arm64-23-Hourly2-GP3",
            "Architecture": "arm64",
            "Region": "us-east-1",
            "CreationDate": "2023-11-15T12:34:56.000Z",
            "DeprecationTime": "2025-11-15T12:34:56.000Z",
            "VirtualizationType": "hvm",
            "ImageOwnerAlias": "amazon",
            "Public": true,
            "EnaSupport": true,
            "BlockDeviceMappings": [{"DeviceName": "/dev/sda1"}]
        });

        let image = AwsImage::adapt(raw).unwrap();

        assert_eq!(image.id, "ami-0123");
        assert_eq!(image.image_id, "ami-0123");
        assert_eq!(image.version, "9.2.0");
        assert_eq!(image.arch, "arm64");
        assert_eq!(image.region, "us-east-1");
        assert_eq!(image.date, Some(Utc.with_ymd_and_hms(2023, 11, 15, 12, 34, 56).unwrap()));
        assert!(image.deprecation_time.is_some());
        assert_eq!(image.virt.as_deref(), Some("hvm"));
        assert_eq!(image.provider.as_deref(), Some("amazon"));
        assert_eq!(image.public, Some(true));
        assert_eq!(image.block_device_mappings, Some(json!([{"DeviceName": "/dev/sda1"}])));
    }

    #[test]
    fn test_adapt_aws_bad_date_keeps_record() {
        let raw = json!({
            "ImageId": "ami-0123",
            "Name": "RHEL-8.8.0_HVM",
            "CreationDate": "not a date"
        });

        let image = AwsImage::adapt(raw).unwrap();
        assert_eq!(image.date, None);
        assert_eq!(image.version, "8.8.0");
    }

    #[test]
    fn test_adapt_azure_record() {
        let raw = json!({
            "architecture": "x64",
            "offer": "RHEL",
            "publisher": "RedHat",
            "sku": "9-lvm-gen2",
            "urn": "RedHat:RHEL:9-lvm-gen2:9.5.2023122216",
            "version": "9.5.2023122216"
        });

        let image = AzureImage::adapt(raw).unwrap();

        assert_eq!(image.id, "RedHat:RHEL:9-lvm-gen2:9.5.2023122216");
        assert_eq!(image.version, "9.5.2023122216");
        assert_eq!(image.sku, "9-lvm-gen2");
        assert_eq!(
            image.build_date,
            Some(Utc.with_ymd_and_hms(2023, 12, 22, 16, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_adapt_google_record() {
        let raw = json!({
            "id": 1234567890u64,
            "name": "rhel-9-arm64-v20240515",
            "architecture": "ARM64",
            "creationTimestamp": "2024-05-15T10:23:45.000-07:00",
            "diskSizeGb": "20",
            "family": "rhel-9-arm64",
            "licenseCodes": ["7883559014960410759"],
            "rawDisk": {"containerType": "TAR", "source": ""}
        });

        let image = GoogleImage::adapt(raw).unwrap();

        assert_eq!(image.id, "1234567890");
        assert_eq!(image.version, "9.arm64");
        assert_eq!(image.arch, "ARM64");
        assert_eq!(image.disk_size_gb.as_deref(), Some("20"));
        assert_eq!(image.license_codes, Some(json!(["7883559014960410759"])));
        assert_eq!(image.raw_disk, Some(json!({"containerType": "TAR", "source": ""})));
        assert!(image.creation_timestamp.is_some());
    }

    #[test]
    fn test_missing_identifier_is_malformed() {
        let err = AwsImage::adapt(json!({"Name": "RHEL-9.2.0"})).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));

        let err = AzureImage::adapt(json!({"urn": ""})).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));

        let err = GoogleImage::adapt(json!("not an object")).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn test_ingest_skips_bad_and_duplicate_records() {
        let raw = vec![
            json!({"ImageId": "ami-a", "Name": "RHEL-9.2.0_HVM", "Region": "us-east-1"}),
            json!({"Name": "no id"}),
            json!({"ImageId": "ami-b", "Name": 42}),
            json!({"ImageId": "ami-a", "Name": "RHEL-9.3.0_HVM", "Region": "us-east-1"}),
            json!({"ImageId": "ami-c", "Name": "RHEL-9.3.0_HVM", "Region": "us-west-2"}),
        ];

        let batch: Batch<AwsImage> = ingest(raw);

        assert_eq!(batch.skipped, 3);
        let ids: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ami-a", "ami-c"]);
        assert_eq!(batch.records[0].version, "9.2.0");
    }

    #[test]
    fn test_ingest_empty_listing() {
        let batch: Batch<GoogleImage> = ingest(Vec::new());
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_read_listing() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"urn": "RedHat:RHEL:9_3:9.3.2023111017"}}, {{"urn": 7}}]"#).unwrap();
        let listing = read_listing(file.path()).unwrap();
        assert_eq!(listing.len(), 2);

        let batch: Batch<AzureImage> = ingest(listing);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].id, "7");

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, "null").unwrap();
        assert!(read_listing(empty.path()).unwrap().is_empty());

        let mut object = tempfile::NamedTempFile::new().unwrap();
        write!(object, r#"{{"not": "a listing"}}"#).unwrap();
        assert!(matches!(read_listing(object.path()), Err(Error::Json(_))));

        let missing = read_listing(Path::new("/nonexistent/listing.json"));
        assert!(matches!(missing, Err(Error::Other(_))));
    }
}

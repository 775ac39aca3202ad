//! Shared types for the image catalog: providers, records, version ordering and errors

pub mod error;
pub mod provider;
pub mod records;
pub mod version;

pub use error::{Error, Result};
pub use provider::Provider;
pub use records::{AwsImage, AzureImage, CatalogRecord, GoogleImage};
pub use version::{compare_versions, VersionKey};

//! Version extraction and ordering
//!
//! Provider records carry their release in very different shapes: AWS and
//! Google embed it in the image name, Azure ships a dotted build string.
//! Everything is first reduced to a normalized string of dot-separated
//! components, and [`VersionKey`] gives those strings a total order.
//!
//! Ordering rules, applied component by component from the left:
//! - two numeric components compare as integers (`10 > 9`)
//! - two label components (`arm64`) compare as text
//! - a label is lower than any number at the same position
//! - a version that is a strict prefix of another is lower (`9.7 < 9.7.0`)
//!
//! The empty string has no components and sorts below everything.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

fn aws_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\.\d+(\.\d+)?").expect("static regex"))
}

fn google_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"rhel-(\d{1,2}(?:-arm64)*)").expect("static regex"))
}

/// Extract the RHEL version from an AWS image name.
///
/// Returns the first `major.minor[.patch]` run found anywhere in the name,
/// or an empty string.
pub fn extract_aws_version(image_name: &str) -> String {
    aws_pattern()
        .find(image_name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Extract the RHEL version from a Google image name.
///
/// `rhel-9-arm64-v20240515` becomes `9.arm64`.
pub fn extract_google_version(image_name: &str) -> String {
    google_pattern()
        .captures(image_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace('-', "."))
        .unwrap_or_default()
}

/// Drop the build timestamp from an Azure version (`9.5.2023122216` -> `9.5`).
pub fn truncate_azure_version(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

/// One dot-separated component of a version.
///
/// Variant order matters: the derived `Ord` ranks every label below every
/// number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Label(String),
    Number(u64),
}

/// Comparable form of a normalized version string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey {
    components: Vec<Component>,
}

impl VersionKey {
    /// Parse a normalized version string
    pub fn parse(version: &str) -> Self {
        if version.is_empty() {
            return Self {
                components: Vec::new(),
            };
        }

        let components = version
            .split('.')
            .map(|part| match part.parse::<u64>() {
                Ok(n) => Component::Number(n),
                Err(_) => Component::Label(part.to_string()),
            })
            .collect();

        Self { components }
    }

    /// True for the key of an empty (unmatched) version
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Total order over version strings.
///
/// Strings whose keys are equal (`9.01` and `9.1`) fall back to plain text
/// comparison so that distinct strings never compare equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a)
        .cmp(&VersionKey::parse(b))
        .then_with(|| a.cmp(b))
}

/// Sort version strings newest first
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare_versions(b, a));
}

#[cfg(test)]
mod tests {
    use super::*;

    const AWS_IMAGES: &[(&str, &str)] = &[
        ("RHEL-9.2.0_HVM-20231115-arm64-23-Hourly2-GP3", "9.2.0"),
        ("RHEL_HA-9.0.0_HVM-20231003-x86_64-16-Hourly2-GP2", "9.0.0"),
        ("RHEL-SAP-8.2.0_HVM-20230117-x86_64-9-Hourly2-GP2", "8.2.0"),
        ("RHEL-7.9_HVM-20211005-x86_64-0-Hourly2-GP2", "7.9"),
    ];

    const GOOGLE_IMAGES: &[(&str, &str)] = &[
        ("rhel-7-v20240515", "7"),
        ("rhel-8-v20240515", "8"),
        ("rhel-9-arm64-v20240515", "9.arm64"),
        ("rhel-9-v20240515", "9"),
    ];

    #[test]
    fn test_extract_aws_version() {
        for (name, expected) in AWS_IMAGES {
            assert_eq!(extract_aws_version(name), *expected, "name: {}", name);
        }
    }

    #[test]
    fn test_extract_google_version() {
        for (name, expected) in GOOGLE_IMAGES {
            assert_eq!(extract_google_version(name), *expected, "name: {}", name);
        }
    }

    #[test]
    fn test_unmatched_names_yield_empty_version() {
        assert_eq!(extract_aws_version("RHEL_HVM-x86_64-Hourly2"), "");
        assert_eq!(extract_google_version("centos-stream-9-v20240515"), "");
        assert_eq!(extract_google_version(""), "");
    }

    #[test]
    fn test_google_two_digit_major() {
        assert_eq!(extract_google_version("rhel-10-arm64-v20250101"), "10.arm64");
        assert_eq!(extract_google_version("rhel-10-v20250101"), "10");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        for (name, _) in AWS_IMAGES {
            assert_eq!(extract_aws_version(name), extract_aws_version(name));
        }
    }

    #[test]
    fn test_truncate_azure_version() {
        assert_eq!(truncate_azure_version("7.9.2023122216"), "7.9");
        assert_eq!(truncate_azure_version("10.0.2023122216"), "10.0");
        assert_eq!(truncate_azure_version("9"), "9");
        assert_eq!(truncate_azure_version(""), "");
    }

    #[test]
    fn test_numeric_components_compare_as_integers() {
        assert_eq!(compare_versions("10.0.0", "9.7.3"), Ordering::Greater);
        assert_eq!(compare_versions("9.10", "9.9"), Ordering::Greater);
    }

    #[test]
    fn test_label_ranks_below_number() {
        assert_eq!(compare_versions("9.7.1.arm64", "9.7.arm64"), Ordering::Greater);
        assert_eq!(compare_versions("9.5.0", "9.arm64"), Ordering::Greater);
        assert_eq!(compare_versions("9.7.3", "9.7.1.arm64"), Ordering::Greater);
    }

    #[test]
    fn test_prefix_is_lower() {
        assert_eq!(compare_versions("9.7", "9.7.0"), Ordering::Less);
        assert_eq!(compare_versions("9", "9.arm64"), Ordering::Less);
    }

    #[test]
    fn test_empty_version_is_minimum() {
        assert!(VersionKey::parse("").is_empty());
        for other in ["0", "arm64", "7.9.0", "9.arm64"] {
            assert_eq!(compare_versions("", other), Ordering::Less, "vs {}", other);
        }
    }

    #[test]
    fn test_google_fixture_order() {
        let mut versions: Vec<String> = [
            "8.2.0", "7.9.0", "9.5.0", "9.7.3", "10.0.0", "9.7.arm64", "9.arm64",
            "9.7.1.arm64",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        sort_descending(&mut versions);

        assert_eq!(
            versions,
            vec![
                "10.0.0",
                "9.7.3",
                "9.7.1.arm64",
                "9.7.arm64",
                "9.5.0",
                "9.arm64",
                "8.2.0",
                "7.9.0"
            ]
        );
    }

    #[test]
    fn test_ordering_is_total_and_transitive() {
        let samples = [
            "", "7", "7.9", "7.9.0", "8.2.0", "9", "9.arm64", "9.01", "9.1", "9.5.0",
            "9.7", "9.7.arm64", "9.7.1.arm64", "9.7.3", "10.0", "10.0.0", "arm64",
            "x86", "1..2",
        ];

        for a in samples {
            // Antisymmetry: exactly one of <, =, > and equality only for identical strings
            for b in samples {
                let ab = compare_versions(a, b);
                let ba = compare_versions(b, a);
                assert_eq!(ab, ba.reverse(), "{} vs {}", a, b);
                assert_eq!(ab == Ordering::Equal, a == b, "{} vs {}", a, b);

                for c in samples {
                    if ab == Ordering::Less && compare_versions(b, c) == Ordering::Less {
                        assert_eq!(
                            compare_versions(a, c),
                            Ordering::Less,
                            "{} < {} < {}",
                            a,
                            b,
                            c
                        );
                    }
                }
            }
        }
    }
}

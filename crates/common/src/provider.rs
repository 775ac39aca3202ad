//! Cloud provider tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One of the three cloud platforms whose image listings are ingested.
///
/// Every dispatch on a provider is an exhaustive `match`; the only fallible
/// step is parsing a tag string with [`Provider::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Amazon Web Services (per-region image identifiers)
    Aws,
    /// Microsoft Azure (marketplace SKUs)
    Azure,
    /// Google Cloud Platform (global images)
    Google,
}

impl Provider {
    /// All providers, in refresh order
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Google];

    /// Wire tag for this provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "azure" => Ok(Provider::Azure),
            "google" | "gcp" => Ok(Provider::Google),
            _ => Err(Error::InvalidProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("aws".parse::<Provider>().unwrap(), Provider::Aws);
        assert_eq!("Azure".parse::<Provider>().unwrap(), Provider::Azure);
        assert_eq!("gcp".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
    }

    #[test]
    fn test_parse_unknown_tag() {
        let err = "Gewitter".parse::<Provider>().unwrap_err();
        assert!(matches!(err, Error::InvalidProvider(ref tag) if tag == "Gewitter"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
    }
}

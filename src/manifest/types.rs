//! Common types for manifest parsers

use serde::Deserialize;

/// Manifest format an addon archive can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestSource {
    /// WebExtension-style `manifest.json`
    Json,
    /// Legacy `install.rdf`
    Rdf,
}

impl ManifestSource {
    /// Parse order used when none is configured
    pub const DEFAULT_ORDER: [ManifestSource; 2] = [ManifestSource::Json, ManifestSource::Rdf];

    /// Returns the string representation of the manifest source
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestSource::Json => "json",
            ManifestSource::Rdf => "rdf",
        }
    }

    /// Fixed top-level file name the manifest is read from
    pub fn file_name(&self) -> &'static str {
        match self {
            ManifestSource::Json => "manifest.json",
            ManifestSource::Rdf => "install.rdf",
        }
    }

    /// Parse order for a target platform line.
    ///
    /// The later source wins scalar fields, so platform 6 ends with the
    /// legacy manifest and every other line ends with the JSON manifest.
    pub fn order_for_target(target: &str) -> [ManifestSource; 2] {
        if target == "6" {
            [ManifestSource::Json, ManifestSource::Rdf]
        } else {
            [ManifestSource::Rdf, ManifestSource::Json]
        }
    }
}

impl std::str::FromStr for ManifestSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ManifestSource::Json),
            "rdf" => Ok(ManifestSource::Rdf),
            _ => Err(()),
        }
    }
}

/// Addon details extracted from one manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDetail {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub update_url: Option<String>,
    pub min_version: Option<String>,
    pub max_version: Option<String>,
}

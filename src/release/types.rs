//! Types shared by the release directory, cache and resolver

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::config::{XPI_CONTENT_TYPE, ZIP_CONTENT_TYPE};

/// Delimiter joining owner and name in storage keys; never valid in either part
const STORAGE_KEY_DELIMITER: char = '#';

/// Repository identifier (`owner/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoIdError {
    #[error("Invalid repo format: {0:?} (expected owner/name)")]
    Malformed(String),
}

impl RepoId {
    pub fn new(owner: &str, name: &str) -> Result<Self, RepoIdError> {
        let valid = |part: &str| !part.is_empty() && !part.contains(STORAGE_KEY_DELIMITER);
        if !valid(owner) || !valid(name) {
            return Err(RepoIdError::Malformed(format!("{}/{}", owner, name)));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Key addressing this repository's durable cache record (`owner#name`)
    pub fn storage_key(&self) -> String {
        format!("{}{}{}", self.owner, STORAGE_KEY_DELIMITER, self.name)
    }

    /// Inverse of [`RepoId::storage_key`]
    pub fn from_storage_key(key: &str) -> Result<Self, RepoIdError> {
        let (owner, name) = key
            .split_once(STORAGE_KEY_DELIMITER)
            .ok_or_else(|| RepoIdError::Malformed(key.to_string()))?;
        Self::new(owner, name)
    }

    /// File name of a downloaded release artifact
    pub fn artifact_file_name(&self, tag: &str, asset_id: u64) -> String {
        format!("{}+{}@{}.xpi", self.storage_key(), tag, asset_id)
    }

    /// File name of an artifact found through an update manifest
    pub fn update_file_name(&self, current_version: &str) -> String {
        format!("{}+update{}.xpi", self.storage_key(), current_version)
    }
}

impl FromStr for RepoId {
    type Err = RepoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [owner, name] => Self::new(owner, name).map_err(|_| RepoIdError::Malformed(s.to_string())),
            _ => Err(RepoIdError::Malformed(s.to_string())),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One release as reported by the remote release directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    /// Absent for draft releases
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// Pick the installable artifact among the release's assets
    ///
    /// Newest upload first; XPI content type, then zip content type, then a
    /// `.xpi` file name.
    pub fn find_xpi_asset(&self) -> Option<&ReleaseAsset> {
        let mut assets: Vec<&ReleaseAsset> = self.assets.iter().collect();
        assets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let by_content_type =
            |content_type: &str| assets.iter().copied().find(|a| a.content_type == content_type);

        by_content_type(XPI_CONTENT_TYPE)
            .or_else(|| by_content_type(ZIP_CONTENT_TYPE))
            .or_else(|| assets.iter().copied().find(|a| a.name.ends_with(".xpi")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoInfo {
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub login: String,
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub avatar_url: Option<String>,
}

impl UserInfo {
    /// Display name, falling back to the login
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.login)
    }
}

/// Which release of a repository to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSelector {
    /// Latest stable release
    Latest,
    /// Most recent prerelease
    Prerelease,
    /// A literal tag name
    Tag(String),
}

impl FromStr for TagSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "latest" => Self::Latest,
            "pre" => Self::Prerelease,
            tag => Self::Tag(tag.to_string()),
        })
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Prerelease => f.write_str("pre"),
            Self::Tag(tag) => f.write_str(tag),
        }
    }
}

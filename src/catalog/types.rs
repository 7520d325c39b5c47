//! Published catalog data model

use serde::{Deserialize, Serialize};

use crate::config::{GH_PROXY_BASE, KKGITHUB_DOMAIN};
use crate::release::cache::CachedRelease;
use crate::release::types::UserInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Author {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.avatar.is_none()
    }
}

impl From<&UserInfo> for Author {
    fn from(user: &UserInfo) -> Self {
        Self {
            name: Some(user.display_name().to_string()),
            url: Some(user.html_url.clone()).filter(|u| !u.is_empty()),
            avatar: user.avatar_url.clone(),
        }
    }
}

/// Download locations for one artifact: the origin plus two mirrors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpiDownloadUrls {
    #[serde(default)]
    pub github: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kgithub: Option<String>,
}

impl XpiDownloadUrls {
    pub fn from_github(url: &str) -> Self {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        Self {
            github: url.to_string(),
            gh_proxy: Some(format!("{}?q={}", GH_PROXY_BASE, encoded)),
            kgithub: Some(url.replace("github.com", KKGITHUB_DOMAIN)),
        }
    }
}

/// Best release of an addon for one platform line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonRelease {
    #[serde(default)]
    pub target_zotero_version: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpi_download_url: Option<XpiDownloadUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpi_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_zotero_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zotero_version: Option<String>,
}

impl AddonRelease {
    /// Catalog entry for a cached release; failed parses have none
    pub fn from_cached(cached: &CachedRelease, target: &str) -> Option<Self> {
        if !cached.parse_succeeded {
            return None;
        }
        Some(Self {
            target_zotero_version: target.to_string(),
            tag_name: cached.tag.clone(),
            xpi_download_url: Some(XpiDownloadUrls::from_github(&cached.download_url)),
            release_date: Some(cached.published_at.clone()).filter(|d| !d.is_empty()),
            id: cached.addon_id.clone(),
            xpi_version: cached.addon_version.clone(),
            name: cached.addon_name.clone(),
            description: cached.addon_description.clone(),
            min_zotero_version: cached.min_platform_version.clone(),
            max_zotero_version: cached.max_platform_version.clone(),
        })
    }
}

/// One repository's catalog entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub repo: String,
    #[serde(default)]
    pub releases: Vec<AddonRelease>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_unstarred")]
    pub stars: Option<u64>,
    /// Mirror of `stars` read by older clients
    #[serde(default, skip_serializing_if = "is_unstarred")]
    pub star: Option<u64>,
    #[serde(default, skip_serializing_if = "Author::is_empty")]
    pub author: Author,
}

fn is_unstarred(stars: &Option<u64>) -> bool {
    stars.unwrap_or(0) == 0
}

impl AddonInfo {
    /// Set both star fields; a zero count is stored as absent
    pub fn set_stars(&mut self, stars: Option<u64>) {
        let stars = stars.filter(|count| *count > 0);
        self.stars = stars;
        self.star = stars;
    }
}

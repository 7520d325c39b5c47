//! Release cache: per-repository record of already processed release tags

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::addon::XpiDetail;
use crate::release::store::RepoStore;
use crate::release::types::{ReleaseAsset, RepoId};
use crate::version::{WILDCARD, version_in_range};

/// Outcome of processing one release tag
///
/// Serialized field names match the on-disk documents written by earlier
/// releases of the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRelease {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(rename = "xpi_asset_id", default)]
    pub asset_id: u64,
    #[serde(rename = "xpi_name", default)]
    pub asset_name: String,
    #[serde(rename = "xpi_download_url", default)]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_description: Option<String>,
    #[serde(
        rename = "min_zotero_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub min_platform_version: Option<String>,
    #[serde(
        rename = "max_zotero_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_platform_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(rename = "parse_success", default = "default_parse_succeeded")]
    pub parse_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

fn default_parse_succeeded() -> bool {
    true
}

impl Default for CachedRelease {
    fn default() -> Self {
        Self {
            tag: String::new(),
            published_at: String::new(),
            asset_id: 0,
            asset_name: String::new(),
            download_url: String::new(),
            addon_id: None,
            addon_name: None,
            addon_version: None,
            addon_description: None,
            min_platform_version: None,
            max_platform_version: None,
            update_url: None,
            parse_succeeded: true,
            parse_error: None,
        }
    }
}

impl CachedRelease {
    /// Successful parse of `asset`, served from `download_url`
    pub fn parsed(
        tag: &str,
        published_at: &str,
        asset: &ReleaseAsset,
        download_url: &str,
        detail: &XpiDetail,
    ) -> Self {
        Self {
            tag: tag.to_string(),
            published_at: published_at.to_string(),
            asset_id: asset.id,
            asset_name: asset.name.clone(),
            download_url: download_url.to_string(),
            addon_id: detail.id.clone(),
            addon_name: detail.name.clone(),
            addon_version: detail.version.clone(),
            addon_description: detail.description.clone(),
            min_platform_version: Some(detail.min_version.clone()),
            max_platform_version: Some(detail.max_version.clone()),
            update_url: detail.update_url.clone(),
            parse_succeeded: true,
            parse_error: None,
        }
    }

    /// Failed attempt, recorded so the tag is not retried
    pub fn failed(tag: &str, published_at: &str, asset: Option<&ReleaseAsset>, error: &str) -> Self {
        Self {
            tag: tag.to_string(),
            published_at: published_at.to_string(),
            asset_id: asset.map_or(0, |a| a.id),
            asset_name: asset.map(|a| a.name.clone()).unwrap_or_default(),
            download_url: asset.map(|a| a.download_url.clone()).unwrap_or_default(),
            parse_succeeded: false,
            parse_error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Whether this release supports platform line `target` (e.g. `"7"`)
    ///
    /// Requires a successful parse and a minimum bound; an absent maximum is
    /// unbounded.
    pub fn is_compatible_with(&self, target: &str) -> bool {
        if !self.parse_succeeded {
            return false;
        }
        let Some(min) = self.min_platform_version.as_deref().filter(|v| !v.is_empty()) else {
            return false;
        };
        let max = self
            .max_platform_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(WILDCARD);

        version_in_range(&format!("{}.{}", target, WILDCARD), min, max)
    }
}

/// Cached releases of one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCache {
    #[serde(rename = "last_checked", default)]
    pub last_checked_at: String,
    #[serde(rename = "checked_releases", default)]
    pub releases: Vec<CachedRelease>,
}

impl RepoCache {
    pub fn checked_tags(&self) -> HashSet<&str> {
        self.releases.iter().map(|r| r.tag.as_str()).collect()
    }

    pub fn get_release_by_tag(&self, tag: &str) -> Option<&CachedRelease> {
        self.releases.iter().find(|r| r.tag == tag)
    }

    /// Insert or replace the release with the same tag
    pub fn add_release(&mut self, release: CachedRelease) {
        self.releases.retain(|r| r.tag != release.tag);
        self.releases.push(release);
    }

    /// Drop releases whose tag is not in `current_tags`, returning the dropped tags
    pub fn remove_deleted_releases(&mut self, current_tags: &HashSet<&str>) -> Vec<String> {
        let mut removed = Vec::new();
        self.releases.retain(|r| {
            let keep = current_tags.contains(r.tag.as_str());
            if !keep {
                removed.push(r.tag.clone());
            }
            keep
        });
        removed
    }

    /// Latest compatible, successfully parsed release for a platform line
    pub fn get_best_release_for_target(&self, target: &str) -> Option<&CachedRelease> {
        latest(self.releases.iter().filter(|r| r.is_compatible_with(target)))
    }

    pub fn get_latest_release(&self) -> Option<&CachedRelease> {
        latest(self.releases.iter())
    }
}

/// Greatest `published_at`; the first entry wins ties
fn latest<'a>(releases: impl Iterator<Item = &'a CachedRelease>) -> Option<&'a CachedRelease> {
    releases.reduce(|best, r| if r.published_at > best.published_at { r } else { best })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub repos: usize,
    pub total_releases: usize,
}

#[derive(Default)]
struct CacheState {
    repos: IndexMap<RepoId, RepoCache>,
    dirty: HashSet<RepoId>,
}

/// Process-wide registry of repository caches over a durable store
///
/// Records are loaded on first access and written back only when dirty.
/// Store failures are logged per repository and never propagate.
pub struct ReleaseCache {
    store: Box<dyn RepoStore>,
    state: Mutex<CacheState>,
}

impl ReleaseCache {
    pub fn new(store: Box<dyn RepoStore>) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_repo(&self, repo: &RepoId) -> RepoCache {
        match self.store.load(repo) {
            Ok(Some(cache)) => cache,
            Ok(None) => RepoCache::default(),
            Err(e) => {
                warn!("Failed to load cache for {}: {}", repo, e);
                RepoCache::default()
            }
        }
    }

    /// Run `f` against the repository's cache, loading it first if needed
    fn with_repo<R>(&self, repo: &RepoId, f: impl FnOnce(&mut RepoCache) -> R) -> R {
        if !self.lock_state().repos.contains_key(repo) {
            let loaded = self.load_repo(repo);
            self.lock_state().repos.entry(repo.clone()).or_insert(loaded);
        }

        let mut state = self.lock_state();
        let cache = state.repos.entry(repo.clone()).or_default();
        f(cache)
    }

    fn mark_dirty(&self, repo: &RepoId) {
        self.lock_state().dirty.insert(repo.clone());
    }

    /// Snapshot of a repository's cache, empty if it has no record
    pub fn get_repo_cache(&self, repo: &RepoId) -> RepoCache {
        self.with_repo(repo, |cache| cache.clone())
    }

    pub fn add_release(&self, repo: &RepoId, release: CachedRelease) {
        self.with_repo(repo, |cache| cache.add_release(release));
        self.mark_dirty(repo);
    }

    /// Remote tags not yet cached, in remote order without duplicates
    pub fn get_unchecked_tags(&self, repo: &RepoId, all_tags: &[String]) -> Vec<String> {
        self.with_repo(repo, |cache| {
            let checked = cache.checked_tags();
            let mut seen = HashSet::new();
            all_tags
                .iter()
                .filter(|tag| !checked.contains(tag.as_str()) && seen.insert(tag.as_str()))
                .cloned()
                .collect()
        })
    }

    /// Remove cached releases whose tag no longer exists remotely
    pub fn sync_with_remote(&self, repo: &RepoId, current_tags: &[String]) -> Vec<String> {
        let current: HashSet<&str> = current_tags.iter().map(String::as_str).collect();
        let removed = self.with_repo(repo, |cache| cache.remove_deleted_releases(&current));
        if !removed.is_empty() {
            self.mark_dirty(repo);
        }
        removed
    }

    pub fn get_best_release_for_target(&self, repo: &RepoId, target: &str) -> Option<CachedRelease> {
        self.with_repo(repo, |cache| cache.get_best_release_for_target(target).cloned())
    }

    pub fn get_release_by_tag(&self, repo: &RepoId, tag: &str) -> Option<CachedRelease> {
        self.with_repo(repo, |cache| cache.get_release_by_tag(tag).cloned())
    }

    pub fn latest_release(&self, repo: &RepoId) -> Option<CachedRelease> {
        self.with_repo(repo, |cache| cache.get_latest_release().cloned())
    }

    /// Stamp the repository as checked now (UTC, RFC 3339)
    pub fn update_checked_time(&self, repo: &RepoId) {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_repo(repo, |cache| cache.last_checked_at = now);
        self.mark_dirty(repo);
    }

    /// Every repository known to the store or held in memory
    pub fn repos(&self) -> Vec<RepoId> {
        let mut repos = self
            .store
            .list()
            .inspect_err(|e| warn!("Failed to list cached repos: {}", e))
            .unwrap_or_default();
        repos.extend(self.lock_state().repos.keys().cloned());
        repos.sort();
        repos.dedup();
        repos
    }

    pub fn stats(&self) -> CacheStats {
        let repos = self.repos();
        let total_releases = repos
            .iter()
            .map(|repo| self.with_repo(repo, |cache| cache.releases.len()))
            .sum();

        CacheStats {
            repos: repos.len(),
            total_releases,
        }
    }

    /// Write one repository's record; failures are logged and leave it dirty
    fn write_repo(&self, repo: &RepoId) -> bool {
        let Some(snapshot) = self.lock_state().repos.get(repo).cloned() else {
            return false;
        };

        match self.store.save(repo, &snapshot) {
            Ok(()) => {
                let mut state = self.lock_state();
                // A concurrent change after the snapshot keeps the entry dirty
                if state.repos.get(repo) == Some(&snapshot) {
                    state.dirty.remove(repo);
                }
                true
            }
            Err(e) => {
                error!("Failed to save cache for {}: {}", repo, e);
                false
            }
        }
    }

    /// Flush one repository if it has unsaved changes
    pub fn save_repo(&self, repo: &RepoId) -> bool {
        if !self.lock_state().dirty.contains(repo) {
            return false;
        }
        self.write_repo(repo)
    }

    /// Flush every dirty repository, returning how many were written
    pub fn save(&self) -> usize {
        let dirty: Vec<RepoId> = self.lock_state().dirty.iter().cloned().collect();
        let saved = dirty.iter().filter(|repo| self.write_repo(repo)).count();
        if saved > 0 {
            info!("Saved cache for {} repos", saved);
        }
        saved
    }

    /// Write every repository held in memory regardless of dirty state
    pub fn save_all(&self) -> usize {
        let repos: Vec<RepoId> = self.lock_state().repos.keys().cloned().collect();
        let saved = repos.iter().filter(|repo| self.write_repo(repo)).count();
        info!("Saved cache for {} repos", saved);
        saved
    }

    pub fn is_dirty(&self, repo: &RepoId) -> bool {
        self.lock_state().dirty.contains(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::error::CacheError;
    use crate::release::store::{FileStore, MockRepoStore};
    use rstest::rstest;
    use tempfile::TempDir;

    fn release(tag: &str, published_at: &str, min: Option<&str>, max: Option<&str>) -> CachedRelease {
        CachedRelease {
            tag: tag.to_string(),
            published_at: published_at.to_string(),
            asset_id: 1,
            asset_name: "addon.xpi".to_string(),
            download_url: format!("https://github.com/o/r/releases/download/{}/addon.xpi", tag),
            addon_id: Some("addon@example.com".to_string()),
            min_platform_version: min.map(str::to_string),
            max_platform_version: max.map(str::to_string),
            ..Default::default()
        }
    }

    fn repo() -> RepoId {
        "owner/addon".parse().unwrap()
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn file_cache(dir: &TempDir) -> ReleaseCache {
        ReleaseCache::new(Box::new(FileStore::new(dir.path())))
    }

    #[test]
    fn cached_release_round_trips_through_json() {
        let original = CachedRelease {
            update_url: Some("https://example.com/update.json".to_string()),
            addon_name: Some("Addon".to_string()),
            ..release("v1.0.0", "2024-01-01T00:00:00Z", Some("6.0"), Some("7.*"))
        };

        let json = serde_json::to_string(&original).unwrap();
        let decoded: CachedRelease = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn cached_release_reads_legacy_document_keys() {
        let decoded: CachedRelease = serde_json::from_value(serde_json::json!({
            "tag": "v1.2.0",
            "published_at": "2024-02-01T00:00:00Z",
            "xpi_asset_id": 99,
            "xpi_name": "addon.xpi",
            "xpi_download_url": "https://example.com/addon.xpi",
            "min_zotero_version": "6.999",
            "max_zotero_version": "7.*"
        }))
        .unwrap();

        assert_eq!(decoded.asset_id, 99);
        assert!(decoded.parse_succeeded);
        assert_eq!(decoded.min_platform_version.as_deref(), Some("6.999"));

        let encoded = serde_json::to_value(&decoded).unwrap();
        assert!(encoded.get("addon_id").is_none());
        assert_eq!(encoded["parse_success"], serde_json::json!(true));
    }

    #[rstest]
    #[case(Some("6.0"), Some("7.*"), "7", true)]
    #[case(Some("6.0"), Some("7.*"), "6", true)]
    #[case(Some("6.0"), Some("6.*"), "7", false)]
    #[case(Some("6.999"), None, "7", true)]
    #[case(Some("7.0"), Some("7.*"), "6", false)]
    #[case(None, Some("7.*"), "7", false)]
    #[case(Some("*"), Some("*"), "6", true)]
    fn is_compatible_with_returns_expected(
        #[case] min: Option<&str>,
        #[case] max: Option<&str>,
        #[case] target: &str,
        #[case] expected: bool,
    ) {
        let release = release("v1", "2024-01-01T00:00:00Z", min, max);

        assert_eq!(release.is_compatible_with(target), expected);
    }

    #[test]
    fn is_compatible_with_rejects_failed_parse() {
        let release = CachedRelease {
            parse_succeeded: false,
            ..release("v1", "2024-01-01T00:00:00Z", Some("6.0"), Some("7.*"))
        };

        assert!(!release.is_compatible_with("7"));
    }

    #[test]
    fn add_release_replaces_same_tag() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);

        cache.add_release(&repo(), release("v1", "2024-01-01T00:00:00Z", None, None));
        cache.add_release(&repo(), release("v1", "2024-01-01T00:00:00Z", Some("6.0"), None));

        let repo_cache = cache.get_repo_cache(&repo());
        assert_eq!(repo_cache.releases.len(), 1);
        assert_eq!(
            repo_cache.releases[0].min_platform_version.as_deref(),
            Some("6.0")
        );
        assert!(cache.is_dirty(&repo()));
    }

    #[test]
    fn sync_then_unchecked_tags_reflect_remote_set() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        for tag in ["v1", "v2", "v3"] {
            cache.add_release(&repo(), release(tag, "2024-01-01T00:00:00Z", None, None));
        }
        let remote = tags(&["v4", "v2", "v5", "v3", "v4"]);

        let removed = cache.sync_with_remote(&repo(), &remote);
        let unchecked = cache.get_unchecked_tags(&repo(), &remote);

        assert_eq!(removed, tags(&["v1"]));
        assert_eq!(unchecked, tags(&["v4", "v5"]));
        assert!(
            cache
                .get_repo_cache(&repo())
                .releases
                .iter()
                .all(|r| remote.contains(&r.tag))
        );
    }

    #[test]
    fn sync_without_removals_keeps_clean_state() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);

        let removed = cache.sync_with_remote(&repo(), &tags(&["v1"]));

        assert!(removed.is_empty());
        assert!(!cache.is_dirty(&repo()));
    }

    #[test]
    fn best_release_is_latest_compatible_success() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        cache.add_release(&repo(), release("v1", "2024-01-01T00:00:00Z", Some("6.0"), Some("7.*")));
        cache.add_release(&repo(), release("v2", "2024-03-01T00:00:00Z", Some("6.0"), Some("6.*")));
        cache.add_release(
            &repo(),
            CachedRelease::failed("v3", "2024-05-01T00:00:00Z", None, "Download failed"),
        );

        let best7 = cache.get_best_release_for_target(&repo(), "7");
        let best6 = cache.get_best_release_for_target(&repo(), "6");

        assert_eq!(best7.map(|r| r.tag), Some("v1".to_string()));
        assert_eq!(best6.map(|r| r.tag), Some("v2".to_string()));
        assert_eq!(cache.latest_release(&repo()).map(|r| r.tag), Some("v3".to_string()));
    }

    #[test]
    fn save_persists_dirty_repos_for_next_run() {
        let dir = TempDir::new().unwrap();
        {
            let cache = file_cache(&dir);
            cache.add_release(&repo(), release("v1", "2024-01-01T00:00:00Z", Some("6.0"), Some("7.*")));
            cache.update_checked_time(&repo());

            assert_eq!(cache.save(), 1);
            assert!(!cache.is_dirty(&repo()));
            assert_eq!(cache.save(), 0);
        }

        let reopened = file_cache(&dir);
        assert_eq!(reopened.repos(), vec![repo()]);
        assert!(reopened.get_release_by_tag(&repo(), "v1").is_some());
        assert!(!reopened.get_repo_cache(&repo()).last_checked_at.is_empty());
        assert_eq!(
            reopened.stats(),
            CacheStats {
                repos: 1,
                total_releases: 1
            }
        );
    }

    #[test]
    fn load_failure_degrades_to_empty_cache() {
        let mut store = MockRepoStore::new();
        store
            .expect_load()
            .returning(|_| Err(CacheError::LockPoisoned));
        let cache = ReleaseCache::new(Box::new(store));

        assert_eq!(cache.get_repo_cache(&repo()), RepoCache::default());
    }

    #[test]
    fn save_failure_for_one_repo_does_not_block_others() {
        let failing: RepoId = "broken/addon".parse().unwrap();
        let mut store = MockRepoStore::new();
        store.expect_load().returning(|_| Ok(None));
        store.expect_save().returning(|repo, _| {
            if repo.owner == "broken" {
                Err(CacheError::LockPoisoned)
            } else {
                Ok(())
            }
        });
        let cache = ReleaseCache::new(Box::new(store));
        cache.add_release(&failing, release("v1", "2024-01-01T00:00:00Z", None, None));
        cache.add_release(&repo(), release("v1", "2024-01-01T00:00:00Z", None, None));

        let saved = cache.save();

        assert_eq!(saved, 1);
        assert!(cache.is_dirty(&failing));
        assert!(!cache.is_dirty(&repo()));
    }
}

//! Release resolver: keeps the release cache in step with the remote directory

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::addon::{XpiDetail, XpiParser};
use crate::config::{ScraperConfig, TARGET_VERSIONS};
use crate::manifest::ManifestSource;
use crate::release::cache::{CachedRelease, ReleaseCache};
use crate::release::downloader::ArtifactFetcher;
use crate::release::error::ResolveError;
use crate::release::notify::{Issue, IssueSink};
use crate::release::source::ReleaseSource;
use crate::release::types::{ReleaseInfo, RepoId, TagSelector};
use crate::version::{WILDCARD, compare_versions};

/// Knobs for a cache build run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Reprocess every remote tag, not only unchecked ones
    pub full_rebuild: bool,
    pub max_releases_per_repo: Option<usize>,
    pub max_workers: usize,
    pub check_update_url: bool,
    /// Manifest parse order used for cached releases
    pub source_order: Vec<ManifestSource>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

impl From<&ScraperConfig> for ResolverOptions {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            full_rebuild: config.full_rebuild,
            max_releases_per_repo: config.max_releases_per_repo,
            max_workers: config.max_workers,
            check_update_url: config.check_update_url,
            source_order: config.source_order.clone(),
        }
    }
}

/// Totals for one cache build run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub repos_processed: usize,
    pub repos_failed: usize,
    pub new_releases_parsed: usize,
    pub releases_deleted: usize,
    /// `(repo, message)` for every repository that failed
    pub errors: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoOutcome {
    pub new_releases: usize,
    pub deleted_releases: usize,
}

/// Result of checking one pinned release against a platform line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedRelease {
    pub target: String,
    pub tag: String,
    pub release_date: String,
    pub download_url: String,
    pub detail: XpiDetail,
    pub compatible: bool,
}

pub struct ReleaseResolver {
    source: Arc<dyn ReleaseSource>,
    fetcher: Arc<dyn ArtifactFetcher>,
    cache: Arc<ReleaseCache>,
    issues: Arc<dyn IssueSink>,
    parser: XpiParser,
    options: ResolverOptions,
}

impl ReleaseResolver {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        fetcher: Arc<dyn ArtifactFetcher>,
        cache: Arc<ReleaseCache>,
        issues: Arc<dyn IssueSink>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            source,
            fetcher,
            cache,
            issues,
            parser: XpiParser::new(),
            options,
        }
    }

    pub fn cache(&self) -> &ReleaseCache {
        &self.cache
    }

    /// Bring the cache up to date for every repository in `repos`
    ///
    /// Repositories are processed concurrently (bounded by `max_workers`) and
    /// each one is flushed as soon as it finishes. A failing repository is
    /// counted and skipped.
    pub async fn build_cache(&self, repos: &[String]) -> BuildStats {
        info!(
            "Building cache for {} repositories with {} workers",
            repos.len(),
            self.options.max_workers
        );

        let total = repos.len();
        let results: Vec<(String, Result<RepoOutcome, ResolveError>)> = stream::iter(repos)
            .map(|repo| async move { (repo.clone(), self.process_repo_str(repo).await) })
            .buffer_unordered(self.options.max_workers.max(1))
            .collect()
            .await;

        let mut stats = BuildStats::default();
        for (repo, result) in results {
            match result {
                Ok(outcome) => {
                    stats.repos_processed += 1;
                    stats.new_releases_parsed += outcome.new_releases;
                    stats.releases_deleted += outcome.deleted_releases;
                    debug!(
                        "[{}/{}] Completed {}: {} new releases",
                        stats.repos_processed, total, repo, outcome.new_releases
                    );
                }
                Err(e) => {
                    error!("Failed to process {}: {}", repo, e);
                    stats.repos_failed += 1;
                    stats.errors.push((repo, e.to_string()));
                }
            }
        }

        if self.options.full_rebuild {
            self.cache.save_all();
        } else {
            self.cache.save();
        }

        info!(
            "Cache build complete: {} repos, {} new releases, {} deleted releases",
            stats.repos_processed, stats.new_releases_parsed, stats.releases_deleted
        );
        stats
    }

    async fn process_repo_str(&self, repo: &str) -> Result<RepoOutcome, ResolveError> {
        let repo: RepoId = repo.parse()?;
        let outcome = self.process_repo(&repo).await;
        self.cache.save_repo(&repo);
        outcome
    }

    /// Reconcile one repository's cache with its remote release list and
    /// parse every release not cached yet
    pub async fn process_repo(&self, repo: &RepoId) -> Result<RepoOutcome, ResolveError> {
        let releases = self.source.list_releases(repo).await?;
        if releases.is_empty() {
            warn!("No releases found for {}", repo);
        }

        let mut seen = HashSet::new();
        let mut current: Vec<&ReleaseInfo> = releases
            .iter()
            .filter(|r| !r.tag_name.is_empty() && seen.insert(r.tag_name.as_str()))
            .collect();
        let current_tags: Vec<String> = current.iter().map(|r| r.tag_name.clone()).collect();

        let deleted = self.cache.sync_with_remote(repo, &current_tags);
        if !deleted.is_empty() {
            info!("{}: Removed {} deleted releases: {:?}", repo, deleted.len(), deleted);
        }

        let mut to_process = if self.options.full_rebuild {
            current_tags
        } else {
            self.cache.get_unchecked_tags(repo, &current_tags)
        };
        if let Some(max) = self.options.max_releases_per_repo {
            to_process.truncate(max);
        }

        let mut outcome = RepoOutcome {
            new_releases: 0,
            deleted_releases: deleted.len(),
        };

        if to_process.is_empty() {
            debug!("{}: No new releases to process", repo);
            self.cache.update_checked_time(repo);
            return Ok(outcome);
        }

        info!("{}: Processing {} new releases", repo, to_process.len());
        current.retain(|r| to_process.contains(&r.tag_name));

        for release in current {
            let cached = self.parse_release(repo, release).await;
            if cached.parse_succeeded {
                outcome.new_releases += 1;
                debug!("{}@{}: Parsed successfully", repo, release.tag_name);
            } else {
                debug!(
                    "{}@{}: Cached as failed: {}",
                    repo,
                    release.tag_name,
                    cached.parse_error.as_deref().unwrap_or_default()
                );
            }
            self.cache.add_release(repo, cached);
        }

        self.cache.update_checked_time(repo);
        Ok(outcome)
    }

    /// Download and parse one release; every failure becomes a failed record
    pub async fn parse_release(&self, repo: &RepoId, release: &ReleaseInfo) -> CachedRelease {
        let tag = release.tag_name.as_str();
        let published_at = release.published_at.as_deref().unwrap_or_default();

        let Some(asset) = release.find_xpi_asset() else {
            return CachedRelease::failed(tag, published_at, None, "No XPI asset found");
        };

        let path = match self
            .fetcher
            .download(&asset.download_url, &repo.artifact_file_name(tag, asset.id))
            .await
        {
            Ok(path) => path,
            Err(e) => {
                let reason = format!("Download failed: {}", e);
                self.issues.report(Issue::parse_failed(repo, tag, &reason));
                return CachedRelease::failed(tag, published_at, Some(asset), &reason);
            }
        };

        let detail = match self.parse_artifact(&path, &self.options.source_order) {
            Ok(detail) => detail,
            Err(reason) => {
                self.issues.report(Issue::parse_failed(repo, tag, &reason));
                return CachedRelease::failed(tag, published_at, Some(asset), &reason);
            }
        };

        let (detail, download_url) = match self
            .check_for_updates(repo, &detail, &self.options.source_order, None)
            .await
        {
            Some(updated) => updated,
            None => (detail, asset.download_url.clone()),
        };

        let cached = CachedRelease::parsed(tag, published_at, asset, &download_url, &detail);

        if !detail.has_version_bounds() {
            self.issues.report(Issue::missing_version_bounds(repo, tag));
        } else if !TARGET_VERSIONS.iter().any(|t| cached.is_compatible_with(t)) {
            self.issues.report(Issue::incompatible(
                repo,
                tag,
                TARGET_VERSIONS[0],
                &detail.min_version,
                &detail.max_version,
            ));
        }

        cached
    }

    fn parse_artifact(&self, path: &Path, order: &[ManifestSource]) -> Result<XpiDetail, String> {
        self.parser
            .parse(path, order)
            .map_err(|e| format!("Parse failed: {}", e))
    }

    /// Follow the addon's update manifest to a newer build
    ///
    /// Returns the newer build's details and download URL; any failure keeps
    /// the original (`None`). With a `target`, the newer build must also be
    /// compatible with it.
    pub async fn check_for_updates(
        &self,
        repo: &RepoId,
        detail: &XpiDetail,
        order: &[ManifestSource],
        target: Option<&str>,
    ) -> Option<(XpiDetail, String)> {
        if !self.options.check_update_url {
            return None;
        }
        let (Some(update_url), Some(id), Some(version)) = (
            detail.update_url.as_deref().filter(|u| !u.is_empty()),
            detail.id.as_deref(),
            detail.version.as_deref().filter(|v| !v.is_empty()),
        ) else {
            return None;
        };

        let manifest = self
            .fetcher
            .fetch_json(update_url)
            .await
            .inspect_err(|e| debug!("Failed to check updates for {}: {}", repo, e))
            .ok()?;
        let updates = manifest
            .get("addons")
            .and_then(|addons| addons.get(id))
            .and_then(|addon| addon.get("updates"))
            .and_then(Value::as_array)?;

        for update in updates {
            let candidate = update.get("version").and_then(Value::as_str).unwrap_or("0");
            if compare_versions(candidate, version) != Ordering::Greater {
                continue;
            }
            let Some(link) = update.get("update_link").and_then(Value::as_str) else {
                continue;
            };

            let path = match self
                .fetcher
                .download(link, &repo.update_file_name(version))
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    debug!("{}: Failed to download update {}: {}", repo, link, e);
                    continue;
                }
            };

            match self.parser.parse(&path, order) {
                Ok(updated) if target.is_none_or(|t| updated.check_compatible(t)) => {
                    info!(
                        "{}: Found update via update_url: {} -> {}",
                        repo,
                        version,
                        updated.version.as_deref().unwrap_or(WILDCARD)
                    );
                    return Some((updated, link.to_string()));
                }
                Ok(_) => debug!("{}: Update {} is not compatible", repo, link),
                Err(e) => debug!("{}: Failed to parse update {}: {}", repo, link, e),
            }
        }

        None
    }

    /// Resolve a pinned release (`latest`, `pre` or a tag) and check it
    /// against platform line `target`
    ///
    /// Returns `Ok(None)` when there is no release or no usable artifact.
    pub async fn check_pinned_release(
        &self,
        repo: &RepoId,
        selector: &TagSelector,
        target: &str,
    ) -> Result<Option<PinnedRelease>, ResolveError> {
        let Some(release) = self.source.resolve_tag(repo, selector).await? else {
            warn!("No release {} for {}", selector, repo);
            return Ok(None);
        };
        let tag = release.tag_name.as_str();

        let Some(asset) = release.find_xpi_asset() else {
            warn!("No XPI found for {}@{}", repo, tag);
            return Ok(None);
        };

        let path = match self
            .fetcher
            .download(&asset.download_url, &repo.artifact_file_name(tag, asset.id))
            .await
        {
            Ok(path) => path,
            Err(e) => {
                let reason = format!("Download failed: {}", e);
                self.issues.report(Issue::parse_failed(repo, tag, &reason));
                return Ok(None);
            }
        };

        let order = ManifestSource::order_for_target(target);
        let detail = match self.parse_artifact(&path, &order) {
            Ok(detail) => detail,
            Err(reason) => {
                self.issues.report(Issue::parse_failed(repo, tag, &reason));
                return Ok(None);
            }
        };

        let check_version = format!("{}.{}", target, WILDCARD);
        let (detail, download_url) = match self
            .check_for_updates(repo, &detail, &order, Some(&check_version))
            .await
        {
            Some(updated) => updated,
            None => (detail, asset.download_url.clone()),
        };

        let compatible = detail.check_compatible(&check_version);
        if !compatible {
            warn!("{} invalid for platform {}", repo, check_version);
            self.issues.report(Issue::incompatible(
                repo,
                tag,
                target,
                &detail.min_version,
                &detail.max_version,
            ));
        } else if !detail.has_version_bounds() {
            self.issues.report(Issue::missing_version_bounds(repo, tag));
        }

        Ok(Some(PinnedRelease {
            target: target.to_string(),
            tag: tag.to_string(),
            release_date: asset.updated_at.clone(),
            download_url,
            detail,
            compatible,
        }))
    }
}

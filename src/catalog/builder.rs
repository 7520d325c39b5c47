//! Catalog assembly from the release cache

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::fallback::apply_previous_catalogs;
use crate::catalog::types::{AddonInfo, AddonRelease, Author};
use crate::config::TARGET_VERSIONS;
use crate::release::cache::ReleaseCache;
use crate::release::downloader::ArtifactFetcher;
use crate::release::source::ReleaseSource;
use crate::release::types::RepoId;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Input directory not found: {0}")]
    InputDirMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read the tracked repositories from `*.json` files carrying a `repo` key
///
/// Files are visited in name order; unreadable files are logged and skipped.
pub fn load_tracked_repos(input_dir: &Path) -> Result<Vec<String>, CatalogError> {
    if !input_dir.is_dir() {
        return Err(CatalogError::InputDirMissing(input_dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut repos = Vec::new();
    for file in files {
        let parsed = std::fs::read_to_string(&file)
            .map_err(CatalogError::from)
            .and_then(|content| serde_json::from_str::<Value>(&content).map_err(CatalogError::from));
        match parsed {
            Ok(value) => match value.get("repo").and_then(Value::as_str) {
                Some(repo) if !repo.is_empty() => repos.push(repo.to_string()),
                _ => debug!("No repo key in {:?}", file),
            },
            Err(e) => error!("Failed to load {:?}: {}", file, e),
        }
    }

    info!("Loaded {} repositories from {:?}", repos.len(), input_dir);
    Ok(repos)
}

/// Write the catalog as compact JSON, creating parent directories
pub fn write_catalog(path: &Path, catalog: &[AddonInfo]) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(catalog)?)?;
    info!("Saved {} addons to {:?}", catalog.len(), path);
    Ok(())
}

pub struct CatalogBuilder {
    source: Arc<dyn ReleaseSource>,
    fetcher: Arc<dyn ArtifactFetcher>,
    cache: Arc<ReleaseCache>,
    max_workers: usize,
    previous_urls: Vec<String>,
}

impl CatalogBuilder {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        fetcher: Arc<dyn ArtifactFetcher>,
        cache: Arc<ReleaseCache>,
        max_workers: usize,
        previous_urls: Vec<String>,
    ) -> Self {
        Self {
            source,
            fetcher,
            cache,
            max_workers,
            previous_urls,
        }
    }

    /// Assemble the catalog for `repos`, most starred first
    pub async fn build(&self, repos: &[String]) -> Vec<AddonInfo> {
        info!("Generating addon info for {} repositories", repos.len());

        let mut catalog: Vec<AddonInfo> = stream::iter(repos)
            .map(|repo| self.build_addon(repo))
            .buffered(self.max_workers.max(1))
            .filter_map(|addon| async move { addon })
            .collect()
            .await;

        apply_previous_catalogs(self.fetcher.as_ref(), &mut catalog, &self.previous_urls).await;

        catalog.sort_by(|a, b| b.stars.unwrap_or(0).cmp(&a.stars.unwrap_or(0)));
        catalog
    }

    /// Catalog entry for one repository, `None` without a compatible release
    pub async fn build_addon(&self, repo: &str) -> Option<AddonInfo> {
        let repo_id: RepoId = repo
            .parse()
            .inspect_err(|e| warn!("Invalid repo format {}: {}", repo, e))
            .ok()?;

        let releases: Vec<AddonRelease> = TARGET_VERSIONS
            .iter()
            .filter_map(|target| {
                self.cache
                    .get_best_release_for_target(&repo_id, target)
                    .and_then(|cached| AddonRelease::from_cached(&cached, target))
            })
            .collect();
        if releases.is_empty() {
            debug!("{}: No compatible releases found", repo);
            return None;
        }

        let mut addon = AddonInfo {
            repo: repo.to_string(),
            releases,
            name: Some(repo_id.name.clone()),
            ..Default::default()
        };

        match self.source.get_user(&repo_id.owner).await {
            Ok(user) => addon.author = Author::from(&user),
            Err(e) => debug!("Failed to fetch user {}: {}", repo_id.owner, e),
        }

        match self.source.get_repo(&repo_id).await {
            Ok(info) => {
                addon.description = info.description.filter(|d| !d.is_empty());
                addon.set_stars(Some(info.stargazers_count));
            }
            Err(e) => debug!("Failed to fetch repo info {}: {}", repo, e),
        }

        let first = &addon.releases[0];
        if let Some(name) = first.name.clone() {
            addon.name = Some(name);
        }
        if addon.description.is_none() {
            addon.description = first.description.clone();
        }

        Some(addon)
    }
}

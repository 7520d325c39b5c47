//! Fill gaps in a fresh catalog from a previously published one

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::types::{AddonInfo, AddonRelease, Author, XpiDownloadUrls};
use crate::release::downloader::ArtifactFetcher;

fn fill<T: Clone>(current: &mut Option<T>, previous: &Option<T>) {
    if current.is_none() {
        current.clone_from(previous);
    }
}

fn fill_author(current: &mut Author, previous: &Author) {
    fill(&mut current.name, &previous.name);
    fill(&mut current.url, &previous.url);
    fill(&mut current.avatar, &previous.avatar);
}

fn fill_urls(current: &mut Option<XpiDownloadUrls>, previous: &Option<XpiDownloadUrls>) {
    let Some(previous) = previous else {
        return;
    };
    match current {
        Some(urls) => {
            fill(&mut urls.gh_proxy, &previous.gh_proxy);
            fill(&mut urls.kgithub, &previous.kgithub);
        }
        None => *current = Some(previous.clone()),
    }
}

/// Release ids are never carried over from an older catalog
fn fill_release(current: &mut AddonRelease, previous: &AddonRelease) {
    fill_urls(&mut current.xpi_download_url, &previous.xpi_download_url);
    fill(&mut current.release_date, &previous.release_date);
    fill(&mut current.xpi_version, &previous.xpi_version);
    fill(&mut current.name, &previous.name);
    fill(&mut current.description, &previous.description);
    fill(&mut current.min_zotero_version, &previous.min_zotero_version);
    fill(&mut current.max_zotero_version, &previous.max_zotero_version);
}

fn fill_addon(current: &mut AddonInfo, previous: &AddonInfo) {
    fill(&mut current.name, &previous.name);
    fill(&mut current.description, &previous.description);
    if current.stars.is_none() {
        current.set_stars(previous.stars.or(previous.star));
    }
    fill_author(&mut current.author, &previous.author);

    if current.releases.is_empty() {
        current.releases.clone_from(&previous.releases);
        return;
    }
    for release in &mut current.releases {
        if let Some(old) = previous
            .releases
            .iter()
            .find(|r| !r.tag_name.is_empty() && r.tag_name == release.tag_name)
        {
            fill_release(release, old);
        }
    }
}

/// Merge `previous` into `current`, keyed by repository then tag
///
/// Only absent fields are filled. Repositories present only in `previous`
/// are not added.
pub fn merge_fallback(current: &mut [AddonInfo], previous: &[AddonInfo]) {
    let by_repo: HashMap<&str, &AddonInfo> = previous
        .iter()
        .filter(|addon| !addon.repo.is_empty())
        .map(|addon| (addon.repo.as_str(), addon))
        .collect();

    for addon in current.iter_mut() {
        if let Some(old) = by_repo.get(addon.repo.as_str()) {
            debug!("Fallback for {}", addon.repo);
            fill_addon(addon, old);
        }
    }
}

/// Fetch each previously published catalog and merge it into `current`
///
/// Unreachable catalogs and catalogs that are not a list are logged and
/// skipped. Inside a list, each malformed entry is skipped on its own.
pub async fn apply_previous_catalogs(
    fetcher: &dyn ArtifactFetcher,
    current: &mut [AddonInfo],
    urls: &[String],
) {
    for url in urls {
        let previous = match fetcher.fetch_json(url).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to fetch fallback data from {}: {}", url, e);
                continue;
            }
        };
        let items = match serde_json::from_value::<Vec<Value>>(previous) {
            Ok(items) => items,
            Err(e) => {
                warn!("Ignoring malformed fallback data from {}: {}", url, e);
                continue;
            }
        };
        let previous: Vec<AddonInfo> = items
            .into_iter()
            .filter_map(|item| {
                serde_json::from_value::<AddonInfo>(item)
                    .inspect_err(|e| debug!("Skipping fallback entry from {}: {}", url, e))
                    .ok()
            })
            .collect();
        info!("Applying fallback from {} ({} addons)", url, previous.len());
        merge_fallback(current, &previous);
    }
}

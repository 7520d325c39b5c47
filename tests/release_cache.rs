use rstest::rstest;
use tempfile::TempDir;

use addon_scraper::config::{CacheConfig, StoreBackend};
use addon_scraper::release::{CachedRelease, ReleaseCache, RepoId, open_store};

fn open(dir: &TempDir, backend: StoreBackend) -> ReleaseCache {
    let release_cache = match backend {
        StoreBackend::Files => dir.path().join("release_cache"),
        StoreBackend::Sqlite => dir.path().join("release_cache.db"),
    };
    let store = open_store(&CacheConfig {
        release_cache,
        backend,
        ..Default::default()
    })
    .unwrap();
    ReleaseCache::new(store)
}

fn parsed(tag: &str, published_at: &str, max: &str) -> CachedRelease {
    CachedRelease {
        tag: tag.to_string(),
        published_at: published_at.to_string(),
        asset_id: 7,
        asset_name: "addon.xpi".to_string(),
        download_url: format!("https://github.com/owner/addon/releases/download/{}/addon.xpi", tag),
        addon_id: Some("addon@example.com".to_string()),
        addon_version: Some(tag.trim_start_matches('v').to_string()),
        min_platform_version: Some("6.0".to_string()),
        max_platform_version: Some(max.to_string()),
        ..Default::default()
    }
}

#[rstest]
#[case(StoreBackend::Files)]
#[case(StoreBackend::Sqlite)]
fn cache_survives_reopen(#[case] backend: StoreBackend) {
    let dir = TempDir::new().unwrap();
    let repo: RepoId = "owner/addon".parse().unwrap();
    {
        let cache = open(&dir, backend);
        cache.add_release(&repo, parsed("v1.0.0", "2024-01-01T00:00:00Z", "7.*"));
        cache.add_release(&repo, parsed("v0.9.0", "2023-06-01T00:00:00Z", "6.*"));
        cache.add_release(
            &repo,
            CachedRelease::failed("v1.1.0", "2024-02-01T00:00:00Z", None, "No XPI asset found"),
        );
        cache.update_checked_time(&repo);
        assert_eq!(cache.save(), 1);
    }

    let reopened = open(&dir, backend);

    assert_eq!(reopened.repos(), vec![repo.clone()]);
    assert_eq!(reopened.stats().total_releases, 3);
    assert_eq!(
        reopened
            .get_best_release_for_target(&repo, "7")
            .map(|r| r.tag),
        Some("v1.0.0".to_string())
    );
    assert_eq!(
        reopened
            .get_best_release_for_target(&repo, "6")
            .map(|r| r.tag),
        Some("v1.0.0".to_string())
    );
    assert_eq!(
        reopened.get_unchecked_tags(
            &repo,
            &["v1.2.0".to_string(), "v1.1.0".to_string(), "v1.0.0".to_string()]
        ),
        vec!["v1.2.0".to_string()]
    );
}

#[test]
fn file_store_documents_use_published_field_names() {
    let dir = TempDir::new().unwrap();
    let repo: RepoId = "owner/addon".parse().unwrap();
    let cache = open(&dir, StoreBackend::Files);
    cache.add_release(&repo, parsed("v1.0.0", "2024-01-01T00:00:00Z", "7.*"));
    cache.save_all();

    let document: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("release_cache").join("owner#addon.json"))
            .unwrap(),
    )
    .unwrap();

    let release = &document["checked_releases"][0];
    assert_eq!(release["tag"], "v1.0.0");
    assert_eq!(release["xpi_asset_id"], 7);
    assert_eq!(release["min_zotero_version"], "6.0");
    assert_eq!(release["parse_success"], true);
    assert!(release.get("parse_error").is_none());
}

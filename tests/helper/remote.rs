//! In-memory collaborators standing in for GitHub and the downloader

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use addon_scraper::release::error::{DownloadError, RemoteError};
use addon_scraper::release::types::{RepoInfo, UserInfo};
use addon_scraper::release::{Issue, IssueSink, ReleaseInfo, ReleaseSource, RepoId, TagSelector};

/// Release directory backed by a mutable map of `owner/name` to releases
#[derive(Default)]
pub struct FakeSource {
    releases: Mutex<HashMap<String, Vec<ReleaseInfo>>>,
    stars: Mutex<HashMap<String, u64>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_releases(&self, repo: &str, releases: Vec<ReleaseInfo>) {
        self.releases
            .lock()
            .unwrap()
            .insert(repo.to_string(), releases);
    }

    pub fn set_stars(&self, repo: &str, stars: u64) {
        self.stars.lock().unwrap().insert(repo.to_string(), stars);
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<ReleaseInfo>, RemoteError> {
        self.releases
            .lock()
            .unwrap()
            .get(&repo.to_string())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(repo.to_string()))
    }

    async fn resolve_tag(
        &self,
        repo: &RepoId,
        selector: &TagSelector,
    ) -> Result<Option<ReleaseInfo>, RemoteError> {
        let releases = self.list_releases(repo).await?;
        Ok(match selector {
            TagSelector::Latest => releases.into_iter().find(|r| !r.prerelease),
            TagSelector::Prerelease => releases.into_iter().find(|r| r.prerelease),
            TagSelector::Tag(tag) => releases.into_iter().find(|r| &r.tag_name == tag),
        })
    }

    async fn get_repo(&self, repo: &RepoId) -> Result<RepoInfo, RemoteError> {
        Ok(RepoInfo {
            description: Some(format!("{} repository", repo.name)),
            stargazers_count: self
                .stars
                .lock()
                .unwrap()
                .get(&repo.to_string())
                .copied()
                .unwrap_or_default(),
        })
    }

    async fn get_user(&self, owner: &str) -> Result<UserInfo, RemoteError> {
        Ok(UserInfo {
            login: owner.to_string(),
            name: None,
            html_url: format!("https://github.com/{}", owner),
            avatar_url: None,
        })
    }
}

/// Fetcher serving pre-built files by URL and recording every download
#[derive(Default)]
pub struct FakeFetcher {
    files: Mutex<HashMap<String, PathBuf>>,
    json: Mutex<HashMap<String, Value>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve_file(&self, url: &str, path: PathBuf) {
        self.files.lock().unwrap().insert(url.to_string(), path);
    }

    pub fn serve_json(&self, url: &str, value: Value) {
        self.json.lock().unwrap().insert(url.to_string(), value);
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl addon_scraper::release::ArtifactFetcher for FakeFetcher {
    async fn download(&self, url: &str, _file_name: &str) -> Result<PathBuf, DownloadError> {
        self.downloads.lock().unwrap().push(url.to_string());
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Status {
                status: 404,
                url: url.to_string(),
            })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, DownloadError> {
        self.json
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// Issue sink keeping every reported issue
#[derive(Default)]
pub struct CollectingSink {
    issues: Mutex<Vec<Issue>>,
}

impl CollectingSink {
    pub fn titles(&self) -> Vec<String> {
        self.issues
            .lock()
            .unwrap()
            .iter()
            .map(|issue| issue.title.clone())
            .collect()
    }
}

impl IssueSink for CollectingSink {
    fn report(&self, issue: Issue) {
        self.issues.lock().unwrap().push(issue);
    }
}

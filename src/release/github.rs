//! GitHub Releases API implementation of the release directory

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::{GitHubConfig, MAX_RELEASE_PAGES, RELEASES_PER_PAGE};
use crate::release::error::RemoteError;
use crate::release::source::ReleaseSource;
use crate::release::types::{ReleaseInfo, RepoId, RepoInfo, TagSelector, UserInfo};

const USER_AGENT: &str = concat!("addon-scraper/", env!("CARGO_PKG_VERSION"));

/// Release directory backed by the GitHub REST API
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.api_base)?,
            config: config.clone(),
        })
    }

    /// API URL for the given path segments, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidResponse(format!("Cannot be a base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_once(&self, url: &Url) -> Result<Response, RemoteError> {
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", &self.config.api_version);
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header("Authorization", format!("token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(url.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited {
                retry_after_secs: retry_after(&response),
            });
        }

        if status == StatusCode::FORBIDDEN {
            let exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v.as_bytes() == b"0");
            let retry_after_secs = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            if exhausted || body.to_lowercase().contains("rate limit") {
                return Err(RemoteError::RateLimited { retry_after_secs });
            }
            return Err(RemoteError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    /// GET with exponential backoff on transient failures
    async fn send(&self, url: &Url) -> Result<Response, RemoteError> {
        let mut attempt = 0;
        loop {
            match self.send_once(url).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_delay() * 2u32.saturating_pow(attempt);
                    debug!("Retrying {} in {:?} after error: {}", url, delay, e);
                    sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, RemoteError> {
        self.send(url).await?.json().await.map_err(|e| {
            warn!("Failed to parse GitHub response from {}: {}", url, e);
            RemoteError::InvalidResponse(e.to_string())
        })
    }
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[async_trait::async_trait]
impl ReleaseSource for GitHubClient {
    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<ReleaseInfo>, RemoteError> {
        let mut releases = Vec::new();

        for page in 1..=MAX_RELEASE_PAGES {
            let mut url = self.endpoint(&["repos", &repo.owner, &repo.name, "releases"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &RELEASES_PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<ReleaseInfo> = self.get_json(&url).await?;
            let last_page = batch.len() < RELEASES_PER_PAGE;
            releases.extend(batch);
            if last_page {
                break;
            }
        }

        debug!("Fetched {} releases for {}", releases.len(), repo);
        Ok(releases)
    }

    async fn resolve_tag(
        &self,
        repo: &RepoId,
        selector: &TagSelector,
    ) -> Result<Option<ReleaseInfo>, RemoteError> {
        let url = match selector {
            TagSelector::Prerelease => {
                let releases = self.list_releases(repo).await?;
                return Ok(releases.into_iter().find(|r| r.prerelease));
            }
            TagSelector::Latest => {
                self.endpoint(&["repos", &repo.owner, &repo.name, "releases", "latest"])?
            }
            TagSelector::Tag(tag) => {
                self.endpoint(&["repos", &repo.owner, &repo.name, "releases", "tags", tag])?
            }
        };

        match self.get_json(&url).await {
            Ok(release) => Ok(Some(release)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_repo(&self, repo: &RepoId) -> Result<RepoInfo, RemoteError> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name])?;
        self.get_json(&url).await
    }

    async fn get_user(&self, owner: &str) -> Result<UserInfo, RemoteError> {
        let url = self.endpoint(&["users", owner])?;
        self.get_json(&url).await
    }
}

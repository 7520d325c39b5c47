//! Artifact fetcher with a shared download cache

use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::release::error::DownloadError;

/// Download attempts per artifact
const DOWNLOAD_ATTEMPTS: u32 = 2;

/// Trait for fetching artifacts and small JSON documents over HTTP
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` into a task-local working file named `file_name`
    ///
    /// The returned path is a private copy that may be read freely.
    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf, DownloadError>;

    /// Fetch and decode a JSON document
    async fn fetch_json(&self, url: &str) -> Result<Value, DownloadError>;
}

/// Downloader keeping a shared artifact cache and a per-run working directory
///
/// Artifacts in the shared cache are never opened in place; they are copied
/// into the runtime directory first.
pub struct XpiDownloader {
    client: reqwest::Client,
    cache_dir: PathBuf,
    runtime_dir: PathBuf,
}

impl XpiDownloader {
    pub fn new(cache: &CacheConfig, timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("addon-scraper/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            cache_dir: cache.artifact_dir.clone(),
            runtime_dir: cache.runtime_dir.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Stream the body of `url` into `dest`
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let mut response = self.get(url).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn download_with_retry(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let mut attempt = 1;
        loop {
            match self.fetch_to(url, dest).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if let Err(remove_err) = tokio::fs::remove_file(dest).await
                        && remove_err.kind() != std::io::ErrorKind::NotFound
                    {
                        warn!("Failed to remove partial download {:?}: {}", dest, remove_err);
                    }
                    if attempt >= DOWNLOAD_ATTEMPTS {
                        return Err(e);
                    }
                    warn!("Download of {} failed, retrying: {}", url, e);
                    attempt += 1;
                }
            }
        }
    }
}

/// Remove a stale file or directory, logging anything but `NotFound`
async fn discard(path: &Path) {
    let removed = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = removed
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove stale artifact {:?}: {}", path, e);
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for XpiDownloader {
    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf, DownloadError> {
        let runtime_path = self.runtime_dir.join(file_name);
        if tokio::fs::try_exists(&runtime_path).await? {
            debug!("Using runtime copy {:?}", runtime_path);
            return Ok(runtime_path);
        }

        tokio::fs::create_dir_all(&self.runtime_dir).await?;

        let cache_path = self.cache_dir.join(file_name);
        if tokio::fs::try_exists(&cache_path).await? {
            match tokio::fs::copy(&cache_path, &runtime_path).await {
                Ok(_) => {
                    debug!("Copied cached artifact {:?}", cache_path);
                    return Ok(runtime_path);
                }
                Err(e) => {
                    warn!("Failed to copy cached artifact {:?}, downloading again: {}", cache_path, e);
                    discard(&runtime_path).await;
                    discard(&cache_path).await;
                }
            }
        }

        info!("Downloading {}", url);
        self.download_with_retry(url, &runtime_path).await?;

        let cached = async {
            tokio::fs::create_dir_all(&self.cache_dir).await?;
            tokio::fs::copy(&runtime_path, &cache_path).await
        };
        if let Err(e) = cached.await {
            warn!("Failed to store {:?} in artifact cache: {}", file_name, e);
        }

        Ok(runtime_path)
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, DownloadError> {
        self.get(url)
            .await?
            .json()
            .await
            .map_err(|e| DownloadError::InvalidResponse(e.to_string()))
    }
}

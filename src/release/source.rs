//! Release directory trait for listing and resolving repository releases

#[cfg(test)]
use mockall::automock;

use crate::release::error::RemoteError;
use crate::release::types::{ReleaseInfo, RepoId, RepoInfo, TagSelector, UserInfo};

/// Trait for the remote service hosting repositories and their releases
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Lists every release of a repository, newest first
    ///
    /// # Returns
    /// * `Ok(Vec<ReleaseInfo>)` - Possibly empty list of releases
    /// * `Err(RemoteError)` - If the listing fails
    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<ReleaseInfo>, RemoteError>;

    /// Resolves a selector to a single release, `Ok(None)` when there is none
    async fn resolve_tag(
        &self,
        repo: &RepoId,
        selector: &TagSelector,
    ) -> Result<Option<ReleaseInfo>, RemoteError>;

    async fn get_repo(&self, repo: &RepoId) -> Result<RepoInfo, RemoteError>;

    async fn get_user(&self, owner: &str) -> Result<UserInfo, RemoteError>;
}

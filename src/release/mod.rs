//! Remote releases, artifact download and the per-repository release cache

pub mod cache;
pub mod downloader;
pub mod error;
pub mod github;
pub mod notify;
pub mod resolver;
pub mod source;
pub mod store;
pub mod types;

pub use cache::{CacheStats, CachedRelease, ReleaseCache, RepoCache};
pub use downloader::{ArtifactFetcher, XpiDownloader};
pub use error::{CacheError, DownloadError, RemoteError, ResolveError};
pub use github::GitHubClient;
pub use notify::{Issue, IssueSink, LogIssueSink};
pub use resolver::{BuildStats, PinnedRelease, ReleaseResolver, ResolverOptions};
pub use source::ReleaseSource;
pub use store::{FileStore, RepoStore, SqliteStore, open_store};
pub use types::{ReleaseAsset, ReleaseInfo, RepoId, RepoIdError, TagSelector};

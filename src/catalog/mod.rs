pub mod builder;
pub mod fallback;
pub mod types;

pub use builder::{CatalogBuilder, CatalogError, load_tracked_repos, write_catalog};
pub use fallback::{apply_previous_catalogs, merge_fallback};
pub use types::{AddonInfo, AddonRelease, Author, XpiDownloadUrls};

//! Manifest parser trait definition

use crate::manifest::archive::AddonArchive;
use crate::manifest::types::{ManifestDetail, ManifestSource};

/// Trait for extracting addon details from one manifest format
pub trait ManifestParser: Send + Sync {
    /// Returns the manifest format this parser reads
    fn source(&self) -> ManifestSource;

    /// Read the manifest from the archive and extract its details
    ///
    /// Returns `ManifestError::Missing` when the archive does not carry this
    /// manifest, which callers treat as a soft skip.
    fn parse(&self, archive: &AddonArchive) -> Result<ManifestDetail, ManifestError>;
}

/// Error type for manifest operations
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The archive does not contain the manifest file
    #[error("{0} not found")]
    Missing(&'static str),

    /// The addon path does not exist
    #[error("Addon path does not exist: {0}")]
    PathNotFound(String),

    /// The archive container could not be read
    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid XML manifest: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The install manifest has no Description element
    #[error("No Description element in install manifest")]
    NoDescription,

    /// The manifest id is empty or an unresolved placeholder
    #[error("Invalid addon id: {0:?}")]
    InvalidId(String),
}

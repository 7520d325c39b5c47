//! Manifest layer
//! - traits.rs: ManifestParser trait and ManifestError
//! - types.rs: Common types (ManifestDetail, ManifestSource)
//! - archive.rs: Zip or directory access to addon files
//! - json.rs: manifest.json parser
//! - rdf.rs: install.rdf parser

pub mod archive;
pub mod json;
pub mod rdf;
pub mod traits;
pub mod types;

pub use archive::AddonArchive;
pub use json::JsonManifestParser;
pub use rdf::RdfManifestParser;
pub use traits::{ManifestError, ManifestParser};
pub use types::{ManifestDetail, ManifestSource};

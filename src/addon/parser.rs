//! Runs the manifest parsers over an addon bundle and folds their output

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::addon::detail::XpiDetail;
use crate::manifest::{
    AddonArchive, JsonManifestParser, ManifestError, ManifestParser, ManifestSource,
    RdfManifestParser,
};

#[derive(Debug, thiserror::Error)]
pub enum XpiParseError {
    #[error("Failed to open addon: {0}")]
    Archive(#[from] ManifestError),

    /// No source yielded an addon id; carries each source's failure
    #[error("No addon id found ({})", .0.join("; "))]
    NoAddonId(Vec<String>),
}

/// Parser for whole addon bundles (`.xpi` files or unpacked directories)
#[derive(Clone)]
pub struct XpiParser {
    json: Arc<JsonManifestParser>,
    rdf: Arc<RdfManifestParser>,
}

impl XpiParser {
    pub fn new() -> Self {
        Self {
            json: Arc::new(JsonManifestParser::new()),
            rdf: Arc::new(RdfManifestParser::new()),
        }
    }

    fn parser_for(&self, source: ManifestSource) -> &dyn ManifestParser {
        match source {
            ManifestSource::Json => self.json.as_ref(),
            ManifestSource::Rdf => self.rdf.as_ref(),
        }
    }

    /// Parse the bundle at `path`, reading manifests in `order`
    ///
    /// A manifest that is absent or malformed is skipped; later sources in
    /// `order` win scalar fields per [`XpiDetail::merge`].
    pub fn parse(&self, path: &Path, order: &[ManifestSource]) -> Result<XpiDetail, XpiParseError> {
        let archive = AddonArchive::open(path)?;

        let mut detail = XpiDetail::default();
        let mut failures = Vec::new();

        for source in order {
            match self.parser_for(*source).parse(&archive) {
                Ok(manifest) => detail = detail.merge(&manifest),
                Err(e) => {
                    debug!("{} parsing failed for {:?}: {}", source.as_str(), path, e);
                    failures.push(format!("{}: {}", source.as_str(), e));
                }
            }
        }

        if detail.is_valid() {
            Ok(detail)
        } else {
            Err(XpiParseError::NoAddonId(failures))
        }
    }
}

impl Default for XpiParser {
    fn default() -> Self {
        Self::new()
    }
}

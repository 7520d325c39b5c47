//! install.rdf parser
//!
//! Legacy addons describe themselves with an RDF/XML document. The prefixes
//! used for the metadata and RDF namespaces vary between addons (`em:`,
//! `RDF:`, no prefix at all), so they are resolved from the declarations on
//! the root element instead of being assumed.

use std::borrow::Cow;
use std::collections::HashMap;

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::config::{LEGACY_MAX_VERSION, PLATFORM_APP_ID};
use crate::manifest::archive::AddonArchive;
use crate::manifest::traits::{ManifestError, ManifestParser};
use crate::manifest::types::{ManifestDetail, ManifestSource};
use crate::version::{compare_versions, extends_lower_bound, extends_upper_bound, upper_bound};

const EM_NAMESPACE: &str = "http://www.mozilla.org/2004/em-rdf#";
const RDF_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Parser for legacy `install.rdf` manifests
#[derive(Debug, Default)]
pub struct RdfManifestParser;

impl RdfManifestParser {
    /// Scalar fields read from the main Description element
    const DETAIL_FIELDS: [&'static str; 5] = ["id", "name", "version", "description", "updateURL"];

    /// Fields of one targetApplication entry
    const TARGET_FIELDS: [&'static str; 3] = ["id", "minVersion", "maxVersion"];

    pub fn new() -> Self {
        Self
    }

    /// Read the raw `install.rdf` document
    pub fn read_manifest(&self, archive: &AddonArchive) -> Result<Option<Vec<u8>>, ManifestError> {
        archive.read_entry(ManifestSource::Rdf.file_name())
    }

    /// Extract addon details from an `install.rdf` document
    pub fn extract_details(&self, manifest: &[u8]) -> Result<ManifestDetail, ManifestError> {
        let text = decode_manifest(manifest);
        let doc = Document::parse(&text)?;
        let ns = Namespaces::from_root(doc.root_element());

        let description = ns
            .find_main_description(doc.root_element())
            .ok_or(ManifestError::NoDescription)?;

        let mut fields = ns.collect_fields(description, &Self::DETAIL_FIELDS);
        let id = fields.remove("id").unwrap_or_default();
        if id.is_empty() || (id.starts_with("__") && id.ends_with("__")) {
            return Err(ManifestError::InvalidId(id));
        }

        let mut detail = ManifestDetail {
            id: Some(id),
            name: fields.remove("name"),
            version: fields.remove("version"),
            description: fields.remove("description"),
            update_url: fields.remove("updateURL"),
            ..Default::default()
        };

        for target_app in description
            .descendants()
            .filter(|n| ns.is_em(*n, "targetApplication"))
        {
            let entries = target_app.children().filter(Node::is_element);
            for entry in std::iter::once(target_app).chain(entries) {
                let info = ns.collect_fields(entry, &Self::TARGET_FIELDS);
                fold_target_range(&mut detail, &info);
            }
        }

        Ok(detail)
    }
}

impl ManifestParser for RdfManifestParser {
    fn source(&self) -> ManifestSource {
        ManifestSource::Rdf
    }

    fn parse(&self, archive: &AddonArchive) -> Result<ManifestDetail, ManifestError> {
        let manifest = self
            .read_manifest(archive)?
            .ok_or(ManifestError::Missing(ManifestSource::Rdf.file_name()))?;
        self.extract_details(&manifest)
    }
}

/// Widen the detail's range with one targetApplication entry for the platform
/// Decode manifest bytes as UTF-8, replacing invalid sequences
fn decode_manifest(manifest: &[u8]) -> Cow<'_, str> {
    let manifest = manifest.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(manifest);
    let text = String::from_utf8_lossy(manifest);
    if let Cow::Owned(_) = text {
        warn!("install.rdf is not valid UTF-8; invalid bytes were replaced");
    }
    text
}

fn fold_target_range(detail: &mut ManifestDetail, info: &HashMap<&str, String>) {
    if info.get("id").map(String::as_str) != Some(PLATFORM_APP_ID) {
        return;
    }
    let (Some(min), Some(max)) = (
        info.get("minVersion").filter(|v| !v.is_empty()),
        info.get("maxVersion").filter(|v| !v.is_empty()),
    ) else {
        return;
    };

    match detail.min_version.as_deref() {
        Some(existing) if !extends_lower_bound(existing, min) => {}
        _ => detail.min_version = Some(min.clone()),
    }

    // Legacy manifests cannot target platform 7 or later
    let max = if compare_versions(&upper_bound(max), LEGACY_MAX_VERSION).is_gt() {
        debug!("Clamping legacy maxVersion {} to {}", max, LEGACY_MAX_VERSION);
        LEGACY_MAX_VERSION.to_string()
    } else {
        max.clone()
    };

    match detail.max_version.as_deref() {
        Some(existing) if !extends_upper_bound(existing, &max) => {}
        _ => detail.max_version = Some(max),
    }
}

/// Namespace URIs declared with a prefix on the root element
struct Namespaces<'a> {
    em: Option<&'a str>,
    rdf: Option<&'a str>,
    default: Option<&'a str>,
}

impl<'a> Namespaces<'a> {
    fn from_root(root: Node<'a, '_>) -> Self {
        let prefixed = |uri: &str| {
            root.namespaces()
                .find(|ns| ns.name().is_some() && ns.uri() == uri)
                .map(|ns| ns.uri())
        };
        Self {
            em: prefixed(EM_NAMESPACE),
            rdf: prefixed(RDF_NAMESPACE),
            default: root
                .namespaces()
                .find(|ns| ns.name().is_none())
                .map(|ns| ns.uri()),
        }
    }

    /// Element match on local name; an undeclared namespace matches unprefixed names
    fn is_element(&self, node: Node, namespace: Option<&str>, local: &str) -> bool {
        if !node.is_element() || node.tag_name().name() != local {
            return false;
        }
        let actual = node.tag_name().namespace();
        match namespace {
            Some(uri) => actual == Some(uri),
            None => actual.is_none() || actual == self.default,
        }
    }

    fn is_em(&self, node: Node, local: &str) -> bool {
        self.is_element(node, self.em, local)
    }

    /// The Description carrying targetApplication entries, else the first one
    fn find_main_description<'b, 'i>(&self, root: Node<'b, 'i>) -> Option<Node<'b, 'i>> {
        let mut descriptions = root
            .descendants()
            .filter(|n| self.is_element(*n, self.rdf, "Description"))
            .peekable();
        let first = *descriptions.peek()?;

        descriptions
            .find(|d| d.descendants().any(|n| self.is_em(n, "targetApplication")))
            .or(Some(first))
    }

    /// Read `fields` from the node's attributes, then from its direct child elements
    fn collect_fields<'f>(&self, node: Node, fields: &[&'f str]) -> HashMap<&'f str, String> {
        let mut result = HashMap::new();

        for attr in node.attributes() {
            let in_scope = attr.namespace().is_none() || attr.namespace() == self.em;
            if let Some(field) = fields.iter().find(|f| **f == attr.name())
                && in_scope
            {
                result.insert(*field, attr.value().to_string());
            }
        }

        for child in node.children() {
            if let Some(field) = fields.iter().find(|f| self.is_em(child, f)) {
                result.insert(*field, element_text(child));
            }
        }

        result
    }
}

/// Concatenated direct text content of an element, trimmed
fn element_text(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

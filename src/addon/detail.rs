//! Aggregated addon details merged from one or more manifests

use tracing::warn;

use crate::manifest::ManifestDetail;
use crate::version::{WILDCARD, extends_lower_bound, extends_upper_bound, is_unbounded, version_in_range};

/// Addon details aggregated across manifest sources
///
/// Built as a fold over [`ManifestDetail`]s with [`XpiDetail::merge`]: the
/// first non-empty id sticks, later sources win scalar fields, and the
/// platform range only ever widens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpiDetail {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub update_url: Option<String>,
    pub min_version: String,
    pub max_version: String,
}

impl Default for XpiDetail {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            version: None,
            description: None,
            update_url: None,
            min_version: WILDCARD.to_string(),
            max_version: WILDCARD.to_string(),
        }
    }
}

impl XpiDetail {
    /// Merge one manifest's details into a new aggregate
    ///
    /// An incoming id that differs from an already set id rejects the whole
    /// record and returns `self` unchanged.
    pub fn merge(self, incoming: &ManifestDetail) -> XpiDetail {
        let incoming_id = non_empty(&incoming.id);

        if let (Some(existing), Some(candidate)) = (non_empty(&self.id), incoming_id)
            && existing != candidate
        {
            warn!("XPI id mismatch: {} != {}", existing, candidate);
            return self;
        }

        let mut merged = self;
        if let Some(id) = incoming_id {
            merged.id = Some(id.to_string());
        }
        for (target, value) in [
            (&mut merged.name, &incoming.name),
            (&mut merged.version, &incoming.version),
            (&mut merged.description, &incoming.description),
            (&mut merged.update_url, &incoming.update_url),
        ] {
            if let Some(value) = non_empty(value) {
                *target = Some(value.to_string());
            }
        }

        if let (Some(min), Some(max)) = (
            non_empty(&incoming.min_version),
            non_empty(&incoming.max_version),
        ) {
            if extends_lower_bound(&merged.min_version, min) {
                merged.min_version = min.to_string();
            }
            if extends_upper_bound(&merged.max_version, max) {
                merged.max_version = max.to_string();
            }
        }

        merged
    }

    /// Whether an addon id was resolved from any source
    pub fn is_valid(&self) -> bool {
        non_empty(&self.id).is_some()
    }

    /// Whether `target` (e.g. `"7.*"`) falls within the declared platform range
    pub fn check_compatible(&self, target: &str) -> bool {
        version_in_range(target, &self.min_version, &self.max_version)
    }

    /// Whether at least one platform bound is concrete
    pub fn has_version_bounds(&self) -> bool {
        !is_unbounded(&self.min_version) || !is_unbounded(&self.max_version)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

use std::cmp::Ordering;

/// Segment token that stands for "any value" in a version bound (e.g. "7.*")
pub const WILDCARD: &str = "*";

/// Value substituted for wildcards when a version acts as a lower bound
const LOW_SUBSTITUTE: &str = "0";

/// Value substituted for wildcards when a version acts as an upper bound
const HIGH_SUBSTITUTE: &str = "999";

/// Compare two dotted/hyphenated version strings.
///
/// Hyphens are treated as segment separators, the shorter side is padded
/// with `"0"` segments, and each segment pair is compared numerically when
/// both sides are integers and lexicographically otherwise. A pair where
/// either side is the literal `*` carries no ordering information.
///
/// Examples:
/// - "1.0" == "1.0.0"
/// - "1.0.1" > "1.0"
/// - "1.0.0-beta" > "1.0.0-alpha"
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(LOW_SUBSTITUTE);
        let r = right.get(i).copied().unwrap_or(LOW_SUBSTITUTE);

        if l == WILDCARD || r == WILDCARD {
            continue;
        }

        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => l.cmp(r),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn segments(version: &str) -> Vec<&str> {
    version.split(['.', '-']).collect()
}

/// Replace every wildcard with `"0"`, the value a bound takes when it is
/// used as a minimum.
pub fn lower_bound(version: &str) -> String {
    version.replace(WILDCARD, LOW_SUBSTITUTE)
}

/// Replace every wildcard with `"999"`, the value a bound takes when it is
/// used as a maximum.
pub fn upper_bound(version: &str) -> String {
    version.replace(WILDCARD, HIGH_SUBSTITUTE)
}

/// Whether a version string is empty or consists of the bare wildcard.
pub fn is_unbounded(version: &str) -> bool {
    version.is_empty() || version == WILDCARD
}

/// Check whether `version` falls within `[min, max]`.
///
/// The bounds are widened with wildcard substitution (`min`: `*` -> `0`,
/// `max`: `*` -> `999`) and the tested version is substituted with the
/// opposite extreme on each side, so `"7"` is inside `["6.0", "7.*"]` and
/// `"7.*"` overlaps `["7.1", "8"]`.
pub fn version_in_range(version: &str, min: &str, max: &str) -> bool {
    compare_versions(&lower_bound(min), &upper_bound(version)) != Ordering::Greater
        && compare_versions(&upper_bound(max), &lower_bound(version)) != Ordering::Less
}

/// Whether `candidate` widens an existing minimum bound.
///
/// The candidate is read as a lower bound and the existing one as an upper
/// bound, so a wildcard minimum is always replaced by a concrete one.
pub fn extends_lower_bound(existing: &str, candidate: &str) -> bool {
    compare_versions(&lower_bound(candidate), &upper_bound(existing)) != Ordering::Greater
}

/// Whether `candidate` widens an existing maximum bound.
pub fn extends_upper_bound(existing: &str, candidate: &str) -> bool {
    compare_versions(&upper_bound(candidate), &lower_bound(existing)) != Ordering::Less
}

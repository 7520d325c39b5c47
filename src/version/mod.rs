//! Version comparison for addon and platform version strings
//!
//! Addon manifests describe their supported host range with loose dotted
//! versions such as `"6.0"`, `"7.*"` or `"5.0.97-beta.3"`. These are not
//! semver, so comparison is done segment by segment with wildcard bounds
//! widened by substitution (`*` -> `0` for minimums, `*` -> `999` for
//! maximums) before comparing.
//!
//! # Modules
//!
//! - [`compare`]: Tri-state comparison, range checks and bound widening

pub mod compare;

pub use compare::{
    WILDCARD, compare_versions, extends_lower_bound, extends_upper_bound, is_unbounded,
    lower_bound, upper_bound, version_in_range,
};

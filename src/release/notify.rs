//! Maintainer-facing issue reporting

#[cfg(test)]
use mockall::automock;
use tracing::warn;

use crate::release::types::RepoId;

/// A problem worth surfacing to maintainers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub title: String,
    pub body: String,
    /// Stable key used by sinks to avoid filing the same issue twice
    pub dedupe_key: Option<String>,
}

impl Issue {
    /// A release whose addon details could not be parsed
    pub fn parse_failed(repo: &RepoId, tag: &str, reason: &str) -> Self {
        Self {
            title: format!("Parse {} addon details failed", repo),
            body: format!("xpi: https://github.com/{} @{}\nreason: {}\n", repo, tag, reason),
            dedupe_key: Some(format!("Parse details failed: {}+{}", repo, tag)),
        }
    }

    /// A parsed release that declares no platform version bounds
    pub fn missing_version_bounds(repo: &RepoId, tag: &str) -> Self {
        Self {
            title: format!("Parse {} of zotero version failed", repo),
            body: format!("xpi: https://github.com/{} @{}\n", repo, tag),
            dedupe_key: Some(format!("Parse min/max version failed: {}+{}", repo, tag)),
        }
    }

    /// A parsed release that is incompatible with a target platform line
    pub fn incompatible(repo: &RepoId, tag: &str, target: &str, min: &str, max: &str) -> Self {
        Self {
            title: format!("Invalid {} xpi with zotero version {}.*", repo, target),
            body: format!(
                "xpi: https://github.com/{} @{}\nmin zotero Version: {}\nmax Zotero version: {}\nexpect Zotero version: {}.*\n",
                repo, tag, min, max, target
            ),
            dedupe_key: Some(format!(
                "Target zotero version not match: {}+{}@{}",
                repo, tag, target
            )),
        }
    }
}

/// Side channel receiving issues raised while resolving releases
#[cfg_attr(test, automock)]
pub trait IssueSink: Send + Sync {
    fn report(&self, issue: Issue);
}

/// Sink that records issues as warning events
#[derive(Debug, Default)]
pub struct LogIssueSink;

impl IssueSink for LogIssueSink {
    fn report(&self, issue: Issue) {
        warn!(
            dedupe_key = issue.dedupe_key.as_deref().unwrap_or_default(),
            "{}: {}",
            issue.title,
            issue.body.trim_end()
        );
    }
}

//! Name/tag admission filtering. Excludes always win; when both name and
//! tag filters are configured, an entry must be admitted by both.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use warden_core::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NameFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TagFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// The raw, still-JSON-shaped filter configuration, as stored on a
/// `Registry.filterConfig`. Compiled into a [`CompiledFilter`] once per sync
/// cycle rather than once per candidate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub names: NameFilter,
    #[serde(default)]
    pub tags: TagFilter,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidRegistryConfig(format!("bad glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::InvalidRegistryConfig(format!("bad filter config: {e}")))
}

/// A [`FilterConfig`] compiled into matchable globs, ready to admit/reject
/// a stream of candidates without re-parsing patterns per item.
pub struct CompiledFilter {
    name_include: GlobSet,
    name_exclude: GlobSet,
    tag_include: Vec<String>,
    tag_exclude: Vec<String>,
}

impl CompiledFilter {
    pub fn compile(config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            name_include: build_globset(&config.names.include)?,
            name_exclude: build_globset(&config.names.exclude)?,
            tag_include: config.tags.include.clone(),
            tag_exclude: config.tags.exclude.clone(),
        })
    }

    /// Always admits everything — used when a registry carries no `filterConfig`.
    pub fn pass_through() -> Self {
        Self {
            name_include: GlobSet::empty(),
            name_exclude: GlobSet::empty(),
            tag_include: Vec::new(),
            tag_exclude: Vec::new(),
        }
    }

    pub fn admits(&self, name: &str, tags: &[String]) -> bool {
        if self.name_exclude.is_match(name) {
            return false;
        }
        if !self.name_include.is_empty() && !self.name_include.is_match(name) {
            return false;
        }
        if !self.tag_exclude.is_empty() && tags.iter().any(|t| self.tag_exclude.contains(t)) {
            return false;
        }
        if !self.tag_include.is_empty() && !tags.iter().any(|t| self.tag_include.contains(t)) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_wins_over_include() {
        let config = FilterConfig {
            names: NameFilter {
                include: vec!["prod-*".into()],
                exclude: vec!["prod-beta".into()],
            },
            tags: TagFilter::default(),
        };
        let filter = CompiledFilter::compile(&config).unwrap();
        assert!(filter.admits("prod-server", &[]));
        assert!(!filter.admits("prod-beta", &[]));
    }

    #[test]
    fn tag_include_and_exclude_combine_with_name() {
        let config = FilterConfig {
            names: NameFilter::default(),
            tags: TagFilter {
                include: vec!["production".into(), "testing".into()],
                exclude: vec!["experimental".into()],
            },
        };
        let filter = CompiledFilter::compile(&config).unwrap();
        assert!(filter.admits("production-server", &["production".to_string()]));
        assert!(filter.admits("stable-server", &["testing".to_string()]));
        assert!(!filter.admits("experimental-server", &["production".to_string(), "experimental".to_string()]));
        assert!(!filter.admits("untagged-server", &[]));
    }

    #[test]
    fn no_filters_admits_everything() {
        let filter = CompiledFilter::pass_through();
        assert!(filter.admits("anything", &[]));
    }
}

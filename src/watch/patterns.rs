// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob patterns for a single handler.
///
/// The patterns are relative to the watched source root. Callers pass
/// relative paths with forward slashes (e.g. `"css/site.less"`) into
/// `matches`.
#[derive(Clone)]
pub struct HandlerPatterns {
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for HandlerPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerPatterns").finish_non_exhaustive()
    }
}

impl HandlerPatterns {
    /// Compile include and exclude pattern lists.
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = build_globset(include).context("building include globset")?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self {
            include_set,
            exclude_set,
        })
    }

    /// Returns true if the handler is interested in the given path (relative
    /// to the source root).
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(include: &[&str], exclude: &[&str]) -> HandlerPatterns {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        HandlerPatterns::compile(&include, &exclude).unwrap()
    }

    #[test]
    fn include_only() {
        let p = patterns(&["css/**/*.less"], &[]);
        assert!(p.matches("css/site.less"));
        assert!(p.matches("css/vendor/grid.less"));
        assert!(!p.matches("js/site.js"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let p = patterns(&["css/**/*.less"], &["**/bootstrap/**"]);
        assert!(p.matches("css/site.less"));
        assert!(!p.matches("css/bootstrap/grid.less"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let include = vec!["[".to_string()];
        assert!(HandlerPatterns::compile(&include, &[]).is_err());
    }
}

//! Path exclusions for ownership analysis. Passed explicitly into each computation.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::config::{DEFAULT_EXCLUDE_EXTENSIONS, DEFAULT_EXCLUDE_PATTERNS};
use crate::utils::settings::AnalyticsSettings;

/// Declarative exclusion list: glob patterns over repo-relative paths (`*` crosses `/`,
/// patterns match the whole path) plus bare extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionConfig {
    pub patterns: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXCLUDE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExclusionConfig {
    /// Excludes nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn from_settings(settings: &AnalyticsSettings) -> Self {
        Self {
            patterns: settings.exclude.clone(),
            extensions: settings.exclude_extensions.clone(),
        }
    }

    /// Compile into a matcher. Invalid globs are a validation error.
    pub fn build(&self) -> Result<ExclusionSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::Validation(format!("exclude pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .map_err(|e| Error::Validation(format!("exclude patterns: {e}")))?;
        let extensions = self
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Ok(ExclusionSet { globs, extensions })
    }
}

/// Compiled [`ExclusionConfig`].
#[derive(Clone, Debug)]
pub struct ExclusionSet {
    globs: GlobSet,
    extensions: HashSet<String>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExclusionSet {
    pub fn empty() -> Self {
        Self {
            globs: GlobSet::empty(),
            extensions: HashSet::new(),
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        if !self.extensions.is_empty()
            && let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str())
            && self.extensions.contains(&ext.to_ascii_lowercase())
        {
            return true;
        }
        self.globs.is_match(path)
    }
}

//! File Classification Pipeline
//!
//! Pure functions for classifying changed files and determining rebuild scope.
//! No actor machinery, no side effects.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::SiteConfig;
use crate::core::{ChangeEvent, FileCategory};
use crate::utils::path::is_temp_file;

// =============================================================================
// Classification
// =============================================================================

/// Categorize a path based on config directories.
///
/// The path should already be normalized; the watcher normalizes before
/// classification.
pub fn categorize_path(path: &Path, config: &SiteConfig) -> FileCategory {
    if is_temp_file(path) {
        return FileCategory::Unknown;
    }
    // Check output directory first: it may live under the site root
    if path.starts_with(&config.build.output) {
        return FileCategory::Output;
    }

    // A path without extension may be a removed directory; keep it so
    // prefix lookups can match everything that was under it.
    let dir_like = path.extension().is_none();

    if path == config.config_path {
        FileCategory::Config
    } else if path.starts_with(&config.build.layouts) {
        FileCategory::Layout
    } else if path.starts_with(&config.build.content) {
        if FileCategory::is_page_file(path) || dir_like {
            FileCategory::Content
        } else {
            FileCategory::Unknown
        }
    } else if path.starts_with(&config.build.data) {
        if FileCategory::is_data_file(path) || dir_like {
            FileCategory::Data
        } else {
            FileCategory::Unknown
        }
    } else {
        FileCategory::Unknown
    }
}

/// Rebuild scope of a batch of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing tracked changed.
    Ignored,
    /// Rebuild what the dependency index says depends on these paths.
    Partial(BTreeSet<PathBuf>),
    /// Configuration or layouts changed; rebuild everything.
    Full,
}

/// Result of classifying changed files
#[derive(Debug)]
pub struct ClassifyResult {
    /// Files with their category (for logging)
    pub classified: Vec<(PathBuf, FileCategory)>,
    pub classification: Classification,
}

impl ClassifyResult {
    /// Short human-readable summary, e.g. `content: a.md, data: x.json`.
    pub fn summary(&self, config: &SiteConfig) -> String {
        self.classified
            .iter()
            .filter(|(_, category)| *category != FileCategory::Unknown)
            .map(|(path, category)| {
                format!("{}: {}", category.name(), config.root_relative(path).display())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Classify changed files and determine rebuild scope.
///
/// Any global change (config, layouts) makes the whole batch `Full`.
/// Output and unknown paths are dropped.
pub fn classify_changes(events: &[ChangeEvent], config: &SiteConfig) -> ClassifyResult {
    let mut classified = Vec::with_capacity(events.len());
    let mut full = false;
    let mut partial = BTreeSet::new();

    for event in events {
        let category = categorize_path(&event.path, config);
        classified.push((event.path.clone(), category));

        if category.is_global() {
            full = true;
        } else if category.is_tracked() {
            partial.insert(event.path.clone());
        } else {
            crate::debug!("watch"; "ignored {} ({}): {}", event.kind.name(), category.name(), event.path.display());
        }
    }

    let classification = if full {
        Classification::Full
    } else if partial.is_empty() {
        Classification::Ignored
    } else {
        Classification::Partial(partial)
    };

    ClassifyResult {
        classified,
        classification,
    }
}

// =============================================================================
// Tests
// =============================================================================

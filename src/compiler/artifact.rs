//! Derived artifacts and their identities.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Identity of one derived artifact.
///
/// Aggregates (`Data`, `Pages`) form stage 0 and are published before any
/// page-like artifact of stage 1 reads them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactId {
    /// Every data file, keyed by file stem.
    Data,
    /// Listing of every page.
    Pages,
    /// Site home page.
    Home,
    /// One content page, by path relative to the content directory.
    Page(PathBuf),
    /// Not-found page.
    NotFound,
}

impl ArtifactId {
    /// Number of stages; artifacts render in stage order.
    pub const STAGES: u8 = 2;

    pub const fn stage(&self) -> u8 {
        match self {
            Self::Data | Self::Pages => 0,
            Self::Home | Self::Page(_) | Self::NotFound => 1,
        }
    }

    #[inline]
    pub const fn is_aggregate(&self) -> bool {
        self.stage() == 0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Pages => f.write_str("pages"),
            Self::Home => f.write_str("home"),
            Self::Page(path) => write!(f, "page:{}", path.display()),
            Self::NotFound => f.write_str("404"),
        }
    }
}

/// Parsed data files, keyed by file stem, values in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub files: BTreeMap<String, Value>,
}

impl DataSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.files.get(name)
    }
}

/// One entry of the page listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    /// Source path relative to the content directory.
    pub source: PathBuf,
    pub title: String,
    /// Site-absolute URL, e.g. `/blog/post/`.
    pub url: String,
    pub weight: i64,
}

/// A file destined for the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Path relative to the output root.
    pub path: PathBuf,
    pub body: Arc<str>,
}

/// Payload of a rendered artifact.
#[derive(Debug, Clone)]
pub enum Artifact {
    Data(Arc<DataSet>),
    Pages(Arc<Vec<PageSummary>>),
    File(OutputFile),
}

impl Artifact {
    pub fn as_file(&self) -> Option<&OutputFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Data(_) | Self::Pages(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut ids = vec![
            ArtifactId::NotFound,
            ArtifactId::Page("a.md".into()),
            ArtifactId::Pages,
            ArtifactId::Home,
            ArtifactId::Data,
        ];
        ids.sort_by_key(ArtifactId::stage);
        assert!(ids[..2].iter().all(ArtifactId::is_aggregate));
        assert!(ids[2..].iter().all(|id| !id.is_aggregate()));
    }

    #[test]
    fn test_display() {
        assert_eq!(ArtifactId::Page("blog/post.md".into()).to_string(), "page:blog/post.md");
        assert_eq!(ArtifactId::NotFound.to_string(), "404");
    }
}

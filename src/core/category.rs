//! File category definitions.

use std::path::Path;

/// Category of a file, determines rebuild strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Markdown page under the content directory - rebuild dependents
    Content,
    /// JSON file under the data directory - rebuild dependents
    Data,
    /// Layout file - full rebuild
    Layout,
    /// Site config (kiln.toml) - full rebuild
    Config,
    /// Generated output - ignored
    Output,
    /// Outside watched dirs - ignored
    Unknown,
}

impl FileCategory {
    pub fn name(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Data => "data",
            Self::Layout => "layout",
            Self::Config => "config",
            Self::Output => "output",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a change in this category invalidates everything.
    pub const fn is_global(self) -> bool {
        matches!(self, Self::Config | Self::Layout)
    }

    /// Whether the dependency index can bound the effect of a change.
    pub const fn is_tracked(self) -> bool {
        matches!(self, Self::Content | Self::Data)
    }

    /// Check if a path is a markdown page.
    #[inline]
    pub fn is_page_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
    }

    /// Check if a path is a JSON data file.
    #[inline]
    pub fn is_data_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

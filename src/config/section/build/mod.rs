//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! content = "content"     # Markdown pages (relative to site root)
//! data = "data"           # JSON data files
//! layouts = "layouts"     # HTML layouts: index.html, page.html, 404.html
//! output = "public"       # Output directory
//! mode = "development"    # development | production
//! ```

mod mode;

pub use mode::BuildMode;

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Content source directory.
    pub content: PathBuf,

    /// Data directory (`*.json`).
    pub data: PathBuf,

    /// Layout directory.
    pub layouts: PathBuf,

    /// Build output directory.
    pub output: PathBuf,

    /// Rendering environment.
    pub mode: BuildMode,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            content: "content".into(),
            data: "data".into(),
            layouts: "layouts".into(),
            output: "public".into(),
            mode: BuildMode::default(),
        }
    }
}

impl BuildSectionConfig {
    pub const OUTPUT: FieldPath = FieldPath::new("build.output");

    /// Validate normalized directories against the site root.
    pub fn validate(&self, root: &Path, diag: &mut ConfigDiagnostics) {
        if self.output == root {
            diag.error_with_hint(
                Self::OUTPUT,
                "output directory must not be the site root",
                "use a subdirectory such as `public`",
            );
        }

        for (name, input) in [
            ("content", &self.content),
            ("data", &self.data),
            ("layouts", &self.layouts),
        ] {
            if self.output.starts_with(input) || input.starts_with(&self.output) {
                diag.error(
                    Self::OUTPUT,
                    format!("output directory overlaps the {name} directory"),
                );
            }
        }
    }
}

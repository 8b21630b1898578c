//! `[site]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [site]
//! title = "My Site"
//! base_url = "https://example.org/docs"
//! ```

use serde::{Deserialize, Serialize};

/// Site metadata available to layouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSectionConfig {
    /// Site title, rendered by `{{ site.title }}`.
    pub title: String,

    /// Production base URL. Rewritten to localhost while serving.
    pub base_url: String,
}

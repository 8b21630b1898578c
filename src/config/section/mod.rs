//! Configuration section definitions.
//!
//! Each module corresponds to a section in `kiln.toml`:
//!
//! | Module  | TOML Section | Purpose                              |
//! |---------|--------------|--------------------------------------|
//! | `build` | `[build]`    | Input/output directories, build mode |
//! | `serve` | `[serve]`    | Development server                   |
//! | `site`  | `[site]`     | Site title and base URL              |

pub mod build;
mod serve;
pub mod site;

pub use build::{BuildMode, BuildSectionConfig};
pub use serve::{ServeConfig, ServeOptions};
pub use site::SiteSectionConfig;

//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization and editor-artifact detection

pub mod fs;

pub use fs::{is_temp_file, normalize_path, relative_slash_path};

//! URL to filesystem path resolution.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// Decoded request path without query string or surrounding slashes.
pub fn request_path(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

/// Resolve a URL to a file under `serve_root`, mapping directories to their
/// `index.html`. Anything outside `serve_root` resolves to `None`.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = request_path(url);

    // Reject parent segments before touching the filesystem
    if Path::new(&clean)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return None;
    }

    // Canonicalize to resolve symlinks and verify the path stays under the root
    let root = serve_root.canonicalize().ok()?;
    let canonical = root.join(&clean).canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    let index = canonical.join("index.html");
    (canonical.is_dir() && index.is_file()).then_some(index)
}

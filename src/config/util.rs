//! Configuration utility functions.

use std::path::{Path, PathBuf};
use url::Url;

/// Find config file by searching upward from `start`.
///
/// Walks up parent directories until finding `config_name`.
/// Returns the path to the config file if found.
///
/// # Example
/// ```text
/// /home/user/site/content/posts/  ← start
/// /home/user/site/kiln.toml       ← found!
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Base URL used while serving.
///
/// Without an explicit `override_url`, the configured base URL is rewritten
/// to `localhost` over `http`, keeping its path. With `append_port` the serve
/// port replaces any configured port. URLs without a scheme stay
/// protocol-relative (`//host/`). The result always ends with `/`.
///
/// # Examples
/// ```ignore
/// serve_base_url("https://foo.com/bar", None, true, 1313) -> "http://localhost:1313/bar/"
/// serve_base_url("foo.com", Some("foo.com"), false, 80)   -> "//foo.com/"
/// ```
pub fn serve_base_url(
    configured: &str,
    override_url: Option<&str>,
    append_port: bool,
    port: u16,
) -> Result<String, url::ParseError> {
    let override_url = override_url.filter(|url| !url.is_empty());
    let use_localhost = override_url.is_none();
    let raw = override_url.unwrap_or(configured).trim();

    let protocol_relative = !raw.contains("://");
    let text = match raw.trim_start_matches('/') {
        "" => "http://localhost".to_string(),
        host if protocol_relative => format!("http://{host}"),
        _ => raw.to_string(),
    };

    let mut url = Url::parse(&text)?;
    if use_localhost {
        // http/https are both special schemes, so this cannot fail
        url.set_scheme("http").ok();
        url.set_host(Some("localhost"))?;
    }
    if append_port {
        url.set_port(Some(port)).ok();
    } else if use_localhost {
        url.set_port(None).ok();
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);

    let rendered = url.to_string();
    Ok(match rendered.strip_prefix("http:") {
        Some(rest) if protocol_relative => rest.to_string(),
        _ => rendered,
    })
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_base_url_table() {
        // (name, override, configured, append_port, port, expected)
        let cases = [
            ("basic http localhost", "", "http://foo.com", true, 1313, "http://localhost:1313/"),
            ("https downgraded", "", "https://foo.com", true, 1313, "http://localhost:1313/"),
            ("subdir kept", "", "http://foo.com/bar", true, 1313, "http://localhost:1313/bar/"),
            ("production", "http://foo.com", "http://foo.com", false, 80, "http://foo.com/"),
            ("production subdir", "http://foo.com/bar", "http://foo.com/bar", false, 80, "http://foo.com/bar/"),
            ("no scheme", "", "foo.com", true, 1313, "//localhost:1313/"),
            ("configured port replaced", "", "foo.com:2020", true, 1313, "//localhost:1313/"),
            ("no scheme production", "foo.com", "foo.com", false, 80, "//foo.com/"),
            ("no scheme production with port", "foo.com", "foo.com", true, 2020, "//foo.com:2020/"),
            ("no config", "", "", true, 1313, "//localhost:1313/"),
        ];

        for (name, override_url, configured, append_port, port, expected) in cases {
            let result = serve_base_url(configured, Some(override_url), append_port, port)
                .unwrap_or_else(|err| panic!("{name}: {err}"));
            assert_eq!(result, expected, "{name}");
        }
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("content/posts");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("kiln.toml"), "").unwrap();

        let found = find_config_file(&nested, Path::new("kiln.toml")).unwrap();
        assert_eq!(found, dir.path().join("kiln.toml"));
        assert!(find_config_file(&nested, Path::new("missing.toml")).is_none());
    }
}

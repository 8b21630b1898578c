//! `kiln build`: one full build, then exit.
//!
//! Uses the same [`Builder`] as the live server, so a site that builds here
//! serves identically.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::actor::{BuildOutcome, Builder};
use crate::compiler::{Renderer, SiteRenderer};
use crate::config::SiteConfig;
use crate::core::ShutdownHandle;
use crate::log;
use crate::logger::strip_error_prefix;
use crate::reload::RebuildRequest;
use crate::utils::plural::plural_count;

/// Build the site with the default renderer.
pub fn build_site(config: &SiteConfig, shutdown: &ShutdownHandle) -> Result<BuildOutcome> {
    build_with(config, Arc::new(SiteRenderer), shutdown)
}

/// Build the site once. Fails if any artifact fails.
pub fn build_with(
    config: &SiteConfig,
    renderer: Arc<dyn Renderer>,
    shutdown: &ShutdownHandle,
) -> Result<BuildOutcome> {
    let mut builder = Builder::new(renderer, shutdown.token());
    let outcome = builder.rebuild(config, &RebuildRequest::Full);

    if let Some(err) = &outcome.error {
        bail!("build failed: {}", strip_error_prefix(err.message()));
    }

    log!(
        "build";
        "{}, {} written to {} in {:.0?}",
        plural_count(outcome.affected.len(), "artifact"),
        plural_count(outcome.written, "file"),
        config.root_relative(&outcome.output_root).display(),
        outcome.elapsed
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use std::fs;
    use tempfile::TempDir;

    fn site(files: &[(&str, &str)]) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        for (path, body) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let config =
            SiteConfig::load_with(&dir.path().join("kiln.toml"), Overrides::default()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_build_writes_site() {
        let (_dir, config) = site(&[("kiln.toml", ""), ("content/post.md", "# Post")]);

        let outcome = build_site(&config, &ShutdownHandle::new()).unwrap();
        assert_eq!(outcome.generation, 1);
        assert!(config.build.output.join("index.html").is_file());
        assert!(config.build.output.join("post/index.html").is_file());
    }

    #[test]
    fn test_build_fails_on_broken_data() {
        let (_dir, config) = site(&[("kiln.toml", ""), ("data/nav.json", "{\"items\": [")]);

        let err = build_site(&config, &ShutdownHandle::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("build failed"), "{message}");
        assert!(message.contains("nav.json"), "{message}");
        assert!(!config.build.output.join("index.html").exists());
    }
}

//! Reloadable configuration handle.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement, so a
//! rebuild reads one consistent `SiteConfig` while `kiln.toml` is reloaded.

use crate::config::{ConfigError, SiteConfig};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;

/// Current configuration plus the content hash it was loaded from.
pub struct ConfigHandle {
    current: ArcSwap<SiteConfig>,
    content_hash: Mutex<Option<blake3::Hash>>,
}

impl ConfigHandle {
    pub fn new(config: SiteConfig) -> Self {
        let hash = Self::hash_file(&config);
        Self {
            current: ArcSwap::from_pointee(config),
            content_hash: Mutex::new(hash),
        }
    }

    #[inline]
    pub fn get(&self) -> Arc<SiteConfig> {
        self.current.load_full()
    }

    /// Reload `kiln.toml` if its content changed.
    ///
    /// Returns `Ok(true)` if the config was replaced. On error the previous
    /// config stays active and the next call retries.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let current = self.get();
        let content = fs::read(&current.config_path)
            .map_err(|err| ConfigError::Io(current.config_path.clone(), err))?;
        let new_hash = blake3::hash(&content);

        let mut hash = self.content_hash.lock();
        if *hash == Some(new_hash) {
            return Ok(false);
        }

        let reloaded = current.reload()?;
        self.current.store(Arc::new(reloaded));
        *hash = Some(new_hash);
        Ok(true)
    }

    fn hash_file(config: &SiteConfig) -> Option<blake3::Hash> {
        fs::read(&config.config_path)
            .ok()
            .map(|content| blake3::hash(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use tempfile::TempDir;

    #[test]
    fn test_reload_only_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        fs::write(&path, "[site]\ntitle = \"One\"\n").unwrap();

        let handle = ConfigHandle::new(SiteConfig::load_with(&path, Overrides::default()).unwrap());
        assert!(!handle.reload().unwrap());

        fs::write(&path, "[site]\ntitle = \"Two\"\n").unwrap();
        assert!(handle.reload().unwrap());
        assert_eq!(handle.get().site.title, "Two");
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        fs::write(&path, "[site]\ntitle = \"One\"\n").unwrap();
        let handle = ConfigHandle::new(SiteConfig::load_with(&path, Overrides::default()).unwrap());

        fs::write(&path, "[build]\nmode = \"staging\"\n").unwrap();
        assert!(handle.reload().is_err());
        assert_eq!(handle.get().site.title, "One");

        // still treated as changed on the next attempt
        fs::write(&path, "[site]\ntitle = \"Three\"\n").unwrap();
        assert!(handle.reload().unwrap());
        assert_eq!(handle.get().site.title, "Three");
    }
}

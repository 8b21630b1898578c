use std::path::PathBuf;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

/// Watch-root consistency manager.
///
/// Responsibility:
/// - Attach existing roots at startup
/// - Attach roots that appear later, or were removed and recreated
pub(super) struct WatchRoots {
    desired: Vec<(PathBuf, RecursiveMode)>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(roots: Vec<(PathBuf, RecursiveMode)>) -> Self {
        Self {
            desired: roots,
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing(
        &mut self,
        watcher: &mut RecommendedWatcher,
    ) -> notify::Result<()> {
        for (path, mode) in &self.desired {
            if !path.exists() {
                continue;
            }
            watcher.watch(path, *mode)?;
            self.attached.insert(path.clone());
        }

        Ok(())
    }

    pub(super) fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        // Drop stale handles for roots that no longer exist.
        self.attached.retain(|path| path.exists());

        for (path, mode) in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }

            if watcher.watch(path, *mode).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "attached watch: {}", path.display());
            }
        }
    }

    #[cfg(test)]
    pub(super) fn attached(&self) -> &FxHashSet<PathBuf> {
        &self.attached
    }
}

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::core::{ChangeEvent, ChangeKind};

/// Turns raw debounced changes into change events.
///
/// Pipeline: correct_by_existence → filter_actionable → sort
pub(super) struct EventClassifier;

impl EventClassifier {
    pub(super) fn classify(raw: FxHashMap<PathBuf, ChangeKind>) -> Vec<ChangeEvent> {
        let mut changes = raw;

        Self::correct_by_existence(&mut changes);
        Self::filter_actionable(&mut changes);

        let mut events: Vec<_> = changes
            .into_iter()
            .map(|(path, kind)| ChangeEvent::new(path, kind))
            .collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }

    /// Reconcile event kinds with actual filesystem state.
    ///
    /// The watcher may report stale events (e.g., Created for a file that's already
    /// been deleted, or Removed for a file that still exists after an atomic save).
    pub(super) fn correct_by_existence(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
        changes.retain(|path, kind| {
            let exists = path.exists();
            match *kind {
                ChangeKind::Created if !exists => {
                    crate::debug!("watch"; "discard created (gone): {}", path.display());
                    return false;
                }
                ChangeKind::Modified if !exists => {
                    crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                    *kind = ChangeKind::Removed;
                }
                ChangeKind::Removed if exists => {
                    crate::debug!("watch"; "downgrade removed->modified: {}", path.display());
                    *kind = ChangeKind::Modified;
                }
                _ => {}
            }
            true
        });
    }

    /// Filter to actionable events only.
    ///
    /// A modified directory only means one of its entries changed, which
    /// arrives as its own event. Created and removed directories are kept:
    /// everything under them changed.
    pub(super) fn filter_actionable(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
        changes.retain(|path, kind| {
            let keep = !(*kind == ChangeKind::Modified && path.is_dir());
            if !keep {
                crate::debug!("watch"; "filter modified dir: {}", path.display());
            }
            keep
        });
    }
}

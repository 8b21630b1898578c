//! Rebuild Queue
//!
//! Coalesces rebuild requests that arrive while a rebuild is running.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::Classification;

/// A rebuild to run next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildRequest {
    Full,
    Partial(BTreeSet<PathBuf>),
}

impl RebuildRequest {
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Pending work: at most one rebuild, however many requests were pushed.
///
/// Full dominates partial; partial path sets are unioned.
#[derive(Debug, Default)]
pub struct RebuildQueue {
    full: bool,
    paths: BTreeSet<PathBuf>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, classification: Classification) {
        match classification {
            Classification::Ignored => {}
            Classification::Full => self.push_full(),
            Classification::Partial(paths) => self.paths.extend(paths),
        }
    }

    pub fn push_full(&mut self) {
        self.full = true;
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.paths.is_empty()
    }

    /// Take the coalesced request, leaving the queue empty.
    pub fn take(&mut self) -> Option<RebuildRequest> {
        let paths = std::mem::take(&mut self.paths);
        if std::mem::take(&mut self.full) {
            Some(RebuildRequest::Full)
        } else if paths.is_empty() {
            None
        } else {
            Some(RebuildRequest::Partial(paths))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(paths: &[&str]) -> Classification {
        Classification::Partial(paths.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn test_partial_sets_union() {
        let mut queue = RebuildQueue::new();
        queue.push(partial(&["/a.md"]));
        queue.push(partial(&["/b.json", "/a.md"]));

        assert_eq!(
            queue.take(),
            Some(RebuildRequest::Partial(BTreeSet::from([
                PathBuf::from("/a.md"),
                PathBuf::from("/b.json"),
            ])))
        );
        assert!(queue.is_empty());
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_full_dominates() {
        let mut queue = RebuildQueue::new();
        queue.push(partial(&["/a.md"]));
        queue.push(Classification::Full);
        queue.push(partial(&["/b.md"]));

        assert_eq!(queue.take(), Some(RebuildRequest::Full));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ignored_is_noop() {
        let mut queue = RebuildQueue::new();
        queue.push(Classification::Ignored);
        assert!(queue.is_empty());
        assert_eq!(queue.take(), None);
    }
}

//! Actor Message Definitions
//!
//! ```text
//! FsActor --Changes--> Coordinator --BuildOutcome--> LiveServer
//! ```

use std::path::PathBuf;
use std::time::Duration;

use super::coordinator::BuildError;
use crate::compiler::ArtifactId;
use crate::core::ChangeEvent;

// =============================================================================
// Coordinator Messages
// =============================================================================

/// Messages to the build coordinator
#[derive(Debug)]
pub enum CoordinatorMsg {
    /// Debounced changes, reconciled with the filesystem
    Changes(Vec<ChangeEvent>),
    /// Rebuild everything
    FullRebuild,
}

// =============================================================================
// Build outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Full,
    Partial,
}

impl BuildKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
        }
    }
}

/// Result of one rebuild. The only thing the coordinator tells the server.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Generation produced, or attempted when the build failed.
    pub generation: u64,
    pub kind: BuildKind,
    pub error: Option<BuildError>,
    /// Artifacts recomputed, in stage order.
    pub affected: Vec<ArtifactId>,
    /// Files written (changed content only).
    pub written: usize,
    /// Files removed with their sources.
    pub removed: usize,
    pub output_root: PathBuf,
    pub elapsed: Duration,
}

impl BuildOutcome {
    #[inline]
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether a successful build had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.ok() && self.affected.is_empty() && self.removed == 0
    }
}

//! Actor System for Live Rebuild
//!
//! Message-passing concurrency for watch mode:
//!
//! ```text
//! FsActor --> Coordinator --> outcome applier (LiveServer)
//! (watch)     (rebuild)       (server state)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `coordinator` - Serialized incremental rebuilds

pub mod coordinator;
pub mod fs;
pub mod messages;

pub use coordinator::{BuildError, Builder, Coordinator};
pub use fs::FsActor;
pub use messages::{BuildKind, BuildOutcome, CoordinatorMsg};

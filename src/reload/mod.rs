//! Rebuild planning.
//!
//! ```text
//! ChangeEvent[] ──classify──▶ Classification ──push──▶ RebuildQueue ──take──▶ RebuildRequest
//! ```
//!
//! - `classify` - File categorization and rebuild scope (pure functions)
//! - `queue` - Coalescing of pending rebuild requests

pub mod classify;
pub mod queue;

pub use classify::{Classification, classify_changes};
pub use queue::{RebuildQueue, RebuildRequest};

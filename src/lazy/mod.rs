//! Blocking readiness primitives.
//!
//! - [`Gate`]: one-shot signal that can be re-armed
//! - [`LazyValue`]: a published-once-per-generation slot guarded by a [`Gate`]
//!
//! Producers never compute on behalf of readers: whoever owns a value
//! invalidates it, computes elsewhere, and publishes. Readers only wait.

mod gate;
mod value;

pub use gate::Gate;
pub use value::LazyValue;

use std::sync::Arc;

/// Error type stored in lazy values: cloneable so every reader gets the same one.
pub type SharedError = Arc<anyhow::Error>;

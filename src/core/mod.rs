//! Core types - pure abstractions shared across the codebase.

mod category;
mod change;
mod state;

pub use category::FileCategory;
pub use change::{ChangeEvent, ChangeKind};
pub use state::{ServerState, ServerStateCell, ShutdownHandle, setup_shutdown_handler};

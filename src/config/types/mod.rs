//! Configuration utility types.
//!
//! | Module   | Purpose                                 |
//! |----------|-----------------------------------------|
//! | `error`  | Configuration error types               |
//! | `field`  | Field paths used in diagnostics         |
//! | `handle` | Reloadable configuration handle         |

mod error;
mod field;
mod handle;

pub use error::{ConfigDiagnostics, ConfigError};
pub use field::FieldPath;
pub use handle::ConfigHandle;

//! `[serve]` section configuration.
//!
//! Contains development server settings.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 5277                 # HTTP port number (0 = pick a free port)
//! watch = true                # Auto-rebuild on file changes
//! debounce_ms = 150           # Coalescing window for file events
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};

/// Accepted range for `serve.debounce_ms`.
const DEBOUNCE_RANGE: std::ops::RangeInclusive<u64> = 10..=2000;

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Enable file watcher for live reload.
    pub watch: bool,

    /// Debounce window for file system events, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5277,
            watch: true,
            debounce_ms: 150,
        }
    }
}

impl ServeConfig {
    pub const DEBOUNCE_MS: FieldPath = FieldPath::new("serve.debounce_ms");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !DEBOUNCE_RANGE.contains(&self.debounce_ms) {
            diag.error_with_hint(
                Self::DEBOUNCE_MS,
                format!("debounce of {}ms is out of range", self.debounce_ms),
                format!(
                    "use a value between {} and {}",
                    DEBOUNCE_RANGE.start(),
                    DEBOUNCE_RANGE.end()
                ),
            );
        }
    }
}

/// Fully resolved options the live server is started with.
///
/// Built from `kiln.toml` plus command-line overrides; the server never reads
/// global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub bind_address: IpAddr,
    pub enable_live_reload: bool,
    pub debounce: Duration,
}

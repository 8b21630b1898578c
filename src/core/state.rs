//! Live server state and shutdown signalling.
//!
//! - `ServerState`: immutable snapshot of what the server currently serves
//! - `ServerStateCell`: single-writer / many-reader holder of that snapshot
//! - `ShutdownHandle`: idempotent stop signal shared by the HTTP loop, the
//!   coordinator and the Ctrl+C handler

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tiny_http::Server;
use tokio_util::sync::CancellationToken;

// =============================================================================
// ServerState
// =============================================================================

/// What the live server serves right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    /// Generation of the newest successful build (0 before the first one).
    pub last_good_generation: u64,
    /// Output directory of that build. `None` until a build succeeds.
    pub last_good_output_root: Option<PathBuf>,
    /// Error of the latest build, cleared by the next success.
    pub current_error: Option<String>,
    /// Whether the server still accepts requests.
    pub running: bool,
    /// Whether the first build finished (successfully or not).
    pub ready: bool,
}

/// Atomic holder for [`ServerState`] snapshots.
///
/// Writers replace the whole snapshot; readers never see a half-applied
/// outcome.
pub struct ServerStateCell {
    inner: ArcSwap<ServerState>,
}

impl Default for ServerStateCell {
    fn default() -> Self {
        Self::new(ServerState::default())
    }
}

impl ServerStateCell {
    pub fn new(state: ServerState) -> Self {
        Self {
            inner: ArcSwap::from_pointee(state),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<ServerState> {
        self.inner.load_full()
    }

    /// Apply `f` to a copy of the current state and publish it.
    pub fn update(&self, f: impl Fn(&mut ServerState)) {
        self.inner.rcu(|current| {
            let mut next = ServerState::clone(current);
            f(&mut next);
            next
        });
    }
}

// =============================================================================
// Shutdown
// =============================================================================

struct ShutdownInner {
    triggered: AtomicBool,
    token: CancellationToken,
    /// HTTP server reference for graceful shutdown
    server: Mutex<Option<Arc<Server>>>,
}

/// Programmatic stop signal. Cheap to clone; every clone is the same signal.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownInner>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                triggered: AtomicBool::new(false),
                token: CancellationToken::new(),
                server: Mutex::new(None),
            }),
        }
    }

    /// Token cancelled on shutdown, for async tasks.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Register the HTTP server so `trigger` can unblock its accept loop.
    ///
    /// Registering after shutdown unblocks the server immediately.
    pub fn register_server(&self, server: Arc<Server>) {
        let mut slot = self.inner.server.lock();
        if self.is_shutdown() {
            server.unblock();
            return;
        }
        *slot = Some(server);
    }

    /// Request shutdown. Idempotent; returns whether this call triggered it.
    pub fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.token.cancel();

        // Take the server out so our reference no longer keeps the socket open.
        let server = self.inner.server.lock().take();
        if let Some(server) = server {
            server.unblock();
        }
        true
    }
}

/// Wire Ctrl+C to `handle`. Call once at program start.
pub fn setup_shutdown_handler(handle: ShutdownHandle) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if handle.trigger() {
            crate::log!("serve"; "shutting down...");
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

// =============================================================================
// Tests
// =============================================================================

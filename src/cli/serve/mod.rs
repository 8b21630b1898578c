//! Development server with live rebuild.
//!
//! [`LiveServer`] serves the last good output over HTTP while the build
//! coordinator rebuilds in the background:
//!
//! ```text
//! FsActor ──▶ Coordinator ──BuildOutcome──▶ applier ──▶ ServerStateCell ◀── HTTP workers
//! ```
//!
//! The HTTP loop never waits on a build. Until the first build finished, and
//! once shutdown started, every request gets a 503.

mod lifecycle;
mod path;
mod response;
mod state;

#[cfg(test)]
mod tests;

pub use response::GENERATION_HEADER;
pub use state::{ReadyHandle, Subscribers};

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use tiny_http::{Request, Server};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::actor::coordinator::CHANNEL_BUFFER;
use crate::actor::fs::watch_roots;
use crate::actor::{BuildError, BuildOutcome, Coordinator, CoordinatorMsg, FsActor};
use crate::compiler::{Renderer, SiteRenderer};
use crate::config::{ConfigHandle, Overrides, SiteConfig};
use crate::core::{ChangeEvent, ServerState, ServerStateCell, ShutdownHandle};
use crate::{debug, log};

/// Route answering with a JSON snapshot of the server state.
pub const STATUS_PATH: &str = "__kiln/status";

/// HTTP worker threads.
const REQUEST_THREADS: usize = 4;

/// A running live server: bound socket, build coordinator, file watcher.
pub struct LiveServer {
    /// Taken on shutdown; the socket closes once the last reference drops.
    server: Mutex<Option<Arc<Server>>>,
    addr: SocketAddr,
    config: Arc<ConfigHandle>,
    state: Arc<ServerStateCell>,
    shutdown: ShutdownHandle,
    ready: ReadyHandle,
    subscribers: Subscribers,
    coordinator_tx: mpsc::Sender<CoordinatorMsg>,
    runtime: Mutex<Option<Runtime>>,
}

impl LiveServer {
    /// Load the config at `path` and start serving it.
    ///
    /// An invalid config is a [`BuildError::StartupFatal`]; nothing is bound.
    pub fn open(path: &Path, overrides: Overrides, shutdown: ShutdownHandle) -> Result<Self, BuildError> {
        let config = SiteConfig::load_with(path, overrides)
            .map_err(|err| BuildError::StartupFatal(err.to_string()))?;
        Self::start(config, shutdown)
    }

    /// Start serving `config` with the default renderer.
    pub fn start(config: SiteConfig, shutdown: ShutdownHandle) -> Result<Self, BuildError> {
        Self::start_with(config, Arc::new(SiteRenderer), shutdown)
    }

    /// Bind, then run the first build and watch for changes in the background.
    ///
    /// Returns once the socket is bound; use [`LiveServer::wait_ready`] to
    /// wait for the first build.
    pub fn start_with(
        mut config: SiteConfig,
        renderer: Arc<dyn Renderer>,
        shutdown: ShutdownHandle,
    ) -> Result<Self, BuildError> {
        let fatal = |err: anyhow::Error| BuildError::StartupFatal(format!("{err:#}"));
        let options = config.serve_options();

        let (server, addr) =
            lifecycle::bind_with_retry(options.bind_address, options.port).map_err(fatal)?;
        let server = Arc::new(server);
        // Later config reloads must derive URLs from the port actually bound.
        config.pin_port(addr.port());

        let runtime = lifecycle::build_runtime().map_err(fatal)?;
        let token = shutdown.token();
        let state = Arc::new(ServerStateCell::new(ServerState {
            running: true,
            ..ServerState::default()
        }));
        let ready = ReadyHandle::new();
        let subscribers = Subscribers::default();

        let (coordinator_tx, coordinator_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        // Watcher first, so edits made during the first build are not lost.
        if options.enable_live_reload {
            match FsActor::new(watch_roots(&config), coordinator_tx.clone(), options.debounce) {
                Ok(actor) => {
                    runtime.spawn(actor.run(token.clone()));
                }
                Err(err) => log!("watch"; "watcher failed, live rebuild disabled: {}", err),
            }
        }

        let config = Arc::new(ConfigHandle::new(config));
        let coordinator = Coordinator::new(
            Arc::clone(&config),
            renderer,
            coordinator_rx,
            outcome_tx,
            token,
        );
        runtime.spawn(coordinator.run());
        runtime.spawn(state::run_applier(
            outcome_rx,
            Arc::clone(&state),
            ready.clone(),
            subscribers.clone(),
            shutdown.clone(),
        ));

        shutdown.register_server(Arc::clone(&server));
        log!("serve"; "http://{}", addr);
        debug!("serve"; "serving {}", options.output_dir.display());

        Ok(Self {
            server: Mutex::new(Some(server)),
            addr,
            config,
            state,
            shutdown,
            ready,
            subscribers,
            coordinator_tx,
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Address actually bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Config currently in effect.
    pub fn config(&self) -> Arc<SiteConfig> {
        self.config.get()
    }

    /// Block until the first build finished. Returns its generation.
    pub fn wait_ready(&self) -> Result<u64, BuildError> {
        self.ready.wait()
    }

    pub fn ready_handle(&self) -> ReadyHandle {
        self.ready.clone()
    }

    /// Feed changes directly, bypassing the watcher.
    ///
    /// Must not be called from inside an async context.
    pub fn notify(&self, events: Vec<ChangeEvent>) -> bool {
        self.coordinator_tx
            .blocking_send(CoordinatorMsg::Changes(events))
            .is_ok()
    }

    /// Request a full rebuild.
    pub fn rebuild(&self) -> bool {
        self.coordinator_tx
            .blocking_send(CoordinatorMsg::FullRebuild)
            .is_ok()
    }

    /// Outcomes applied from now on.
    pub fn outcomes(&self) -> Receiver<BuildOutcome> {
        self.subscribers.subscribe()
    }

    pub fn state(&self) -> Arc<ServerState> {
        self.state.snapshot()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve requests until shutdown.
    ///
    /// Returns the startup failure if the first build failed.
    pub fn run(&self) -> Result<(), BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("kiln-http-{i}"))
            .build()
            .map_err(|err| BuildError::StartupFatal(format!("failed to create thread pool: {err}")))?;

        let server = self.server.lock().clone();
        for request in server.iter().flat_map(|server| server.incoming_requests()) {
            let state = Arc::clone(&self.state);
            let shutdown = self.shutdown.clone();
            pool.spawn(move || {
                if let Err(e) = handle_request(request, &state.snapshot(), &shutdown) {
                    debug!("serve"; "request error: {e}");
                }
            });
        }
        drop(server);

        self.shutdown();
        match self.ready.result() {
            Some(Err(err)) if err.is_fatal() => Err(err),
            _ => Ok(()),
        }
    }

    /// Stop serving and stop the background tasks. Idempotent, bounded in time.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        self.state.update(|state| state.running = false);
        self.ready.resolve_shutdown();
        drop(self.server.lock().take());

        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            lifecycle::stop_runtime(runtime);
            debug!("serve"; "stopped");
        }
    }
}

impl Drop for LiveServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle a single HTTP request against one state snapshot.
fn handle_request(request: Request, state: &ServerState, shutdown: &ShutdownHandle) -> Result<()> {
    if shutdown.is_shutdown() || !state.running {
        return response::respond_unavailable(request, "shutting down");
    }

    if path::request_path(request.url()) == STATUS_PATH {
        return response::respond_status(request, state);
    }

    let Some(root) = &state.last_good_output_root else {
        let reason = if state.ready { "first build failed" } else { "first build in progress" };
        return response::respond_unavailable(request, reason);
    };

    let generation = state.last_good_generation;
    match path::resolve_path(request.url(), root) {
        Some(path) => response::respond_file(request, &path, generation),
        None => response::respond_not_found(request, root, generation),
    }
}

/// `kiln serve`: serve until Ctrl+C.
pub fn serve(config: SiteConfig, shutdown: ShutdownHandle) -> Result<()> {
    let server = LiveServer::start(config, shutdown)?;
    server.run()?;
    Ok(())
}

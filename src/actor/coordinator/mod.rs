//! Build Coordinator
//!
//! Serializes rebuilds and turns them into [`BuildOutcome`]s:
//!
//! ```text
//! Idle ──change──▶ Rebuilding ──▶ Succeeded | Failed ──▶ Idle
//! ```
//!
//! Changes arriving while a rebuild runs are coalesced in a [`RebuildQueue`]
//! and run as one follow-up rebuild. Rebuilds run on the blocking pool so
//! the loop keeps answering shutdown while a render is stuck.

mod error;
mod rebuild;


pub use error::BuildError;
pub use rebuild::Builder;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::messages::{BuildKind, BuildOutcome, CoordinatorMsg};
use crate::compiler::Renderer;
use crate::config::ConfigHandle;
use crate::core::FileCategory;
use crate::logger::{status_error, status_success, status_unchanged, strip_error_prefix};
use crate::reload::{Classification, RebuildQueue, classify_changes};
use crate::utils::plural::plural_count;

/// Channel buffer size
pub const CHANNEL_BUFFER: usize = 32;

/// Next step after looking at the queue.
enum Next {
    Idle,
    Started(JoinHandle<BuildOutcome>),
    Failed(BuildOutcome),
}

/// Build coordinator - owns the builder and the rebuild queue.
pub struct Coordinator {
    config: Arc<ConfigHandle>,
    builder: Arc<Mutex<Builder>>,
    rx: mpsc::Receiver<CoordinatorMsg>,
    outcome_tx: mpsc::UnboundedSender<BuildOutcome>,
    token: CancellationToken,
    queue: RebuildQueue,
    /// `kiln.toml` changed since the last rebuild started
    config_changed: bool,
    /// No build has succeeded yet; failures are fatal
    starting: bool,
}

impl Coordinator {
    pub fn new(
        config: Arc<ConfigHandle>,
        renderer: Arc<dyn Renderer>,
        rx: mpsc::Receiver<CoordinatorMsg>,
        outcome_tx: mpsc::UnboundedSender<BuildOutcome>,
        token: CancellationToken,
    ) -> Self {
        let builder = Builder::new(renderer, token.clone());
        Self {
            config,
            builder: Arc::new(Mutex::new(builder)),
            rx,
            outcome_tx,
            token,
            queue: RebuildQueue::new(),
            config_changed: false,
            starting: true,
        }
    }

    /// Run the startup build, then rebuild on every change until shutdown
    /// or a fatal startup failure.
    pub async fn run(mut self) {
        self.queue.push_full();
        let mut running: Option<JoinHandle<BuildOutcome>> = None;
        let mut rx_open = true;

        loop {
            if running.is_none() {
                match self.start_next() {
                    Next::Idle => {}
                    Next::Started(handle) => running = Some(handle),
                    Next::Failed(outcome) => {
                        if !self.finish(outcome) {
                            break;
                        }
                        continue;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                result = join(&mut running) => {
                    running = None;
                    let outcome = result.unwrap_or_else(|err| self.panicked(&err));
                    if !self.finish(outcome) {
                        break;
                    }
                }
                msg = self.rx.recv(), if rx_open => match msg {
                    Some(msg) => self.handle(msg),
                    None => rx_open = false,
                },
            }
        }

        // A rebuild still running sees the cancelled token and stops at the
        // next artifact; nobody waits for it here.
        crate::debug!("build"; "coordinator stopped");
    }

    fn handle(&mut self, msg: CoordinatorMsg) {
        match msg {
            CoordinatorMsg::FullRebuild => self.queue.push_full(),
            CoordinatorMsg::Changes(events) => {
                let config = self.config.get();
                let result = classify_changes(&events, &config);

                if result
                    .classified
                    .iter()
                    .any(|(_, category)| *category == FileCategory::Config)
                {
                    self.config_changed = true;
                }
                if result.classification != Classification::Ignored {
                    crate::log!("watch"; "{}", result.summary(&config));
                }
                self.queue.push(result.classification);
            }
        }
    }

    fn start_next(&mut self) -> Next {
        let Some(request) = self.queue.take() else {
            return Next::Idle;
        };

        if std::mem::take(&mut self.config_changed) {
            match self.config.reload() {
                Ok(true) => crate::log!("config"; "reloaded"),
                Ok(false) => crate::debug!("config"; "content unchanged"),
                Err(err) => {
                    let outcome =
                        self.builder
                            .lock()
                            .fail(BuildKind::Full, err.to_string(), Instant::now());
                    return Next::Failed(outcome);
                }
            }
        }

        let config = self.config.get();
        let builder = Arc::clone(&self.builder);
        Next::Started(tokio::task::spawn_blocking(move || {
            builder.lock().rebuild(&config, &request)
        }))
    }

    /// A render panicked. The builder survives; everything is rebuilt next time.
    fn panicked(&self, err: &JoinError) -> BuildOutcome {
        self.builder.lock().fail(
            BuildKind::Full,
            format!("rebuild worker panicked: {err}"),
            Instant::now(),
        )
    }

    /// Report and forward an outcome. Returns whether to keep running.
    fn finish(&mut self, mut outcome: BuildOutcome) -> bool {
        if self.token.is_cancelled() {
            // Shutdown races are not failures.
            return false;
        }
        if self.starting {
            match outcome.error.take() {
                Some(err) => outcome.error = Some(err.into_fatal()),
                None => self.starting = false,
            }
        }

        report(&outcome);
        let fatal = outcome.error.as_ref().is_some_and(BuildError::is_fatal);
        // The server may already be gone; the outcome is then of no use.
        let _ = self.outcome_tx.send(outcome);
        !fatal
    }
}

async fn join<T>(handle: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn report(outcome: &BuildOutcome) {
    match &outcome.error {
        Some(err) => {
            let summary = format!("{} rebuild #{} failed", outcome.kind.name(), outcome.generation);
            status_error(&summary, &strip_error_prefix(err.message()));
        }
        None if outcome.is_noop() => status_unchanged("nothing to rebuild"),
        None => status_success(&format!(
            "{} rebuild #{}: {}, {} written in {:.0?}",
            outcome.kind.name(),
            outcome.generation,
            plural_count(outcome.affected.len(), "artifact"),
            plural_count(outcome.written, "file"),
            outcome.elapsed,
        )),
    }
}

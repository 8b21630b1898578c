//! Applying build outcomes to the live server.
//!
//! The applier task is the only writer of [`ServerState`]. It also releases
//! [`ReadyHandle`] waiters on the first outcome and fans outcomes out to
//! subscribers.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::actor::{BuildError, BuildOutcome};
use crate::core::{ServerState, ServerStateCell, ShutdownHandle};
use crate::lazy::LazyValue;
use crate::logger::strip_error_prefix;

/// Message for waiters released by shutdown instead of a build.
const SHUT_DOWN_EARLY: &str = "server shut down before the first build finished";

/// Readiness of the first build: its generation, or why it failed.
#[derive(Clone)]
pub struct ReadyHandle {
    value: Arc<LazyValue<u64, BuildError>>,
    /// Serializes the first-publish check between the applier and shutdown
    publish: Arc<Mutex<()>>,
}

impl Default for ReadyHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyHandle {
    pub fn new() -> Self {
        Self {
            value: Arc::new(LazyValue::new()),
            publish: Arc::new(Mutex::new(())),
        }
    }

    /// Block until the first build finished.
    pub fn wait(&self) -> Result<u64, BuildError> {
        self.value.get()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<u64, BuildError>> {
        self.value.get_timeout(timeout)
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_ready()
    }

    /// The first build's result, if there is one yet.
    pub fn result(&self) -> Option<Result<u64, BuildError>> {
        self.value.try_get()
    }

    /// Publish once; later calls are ignored.
    fn resolve(&self, result: Result<u64, BuildError>) {
        let _guard = self.publish.lock();
        if !self.value.is_ready() {
            self.value.publish(result);
        }
    }

    /// Release waiters when shutdown wins the race against the first build.
    pub(super) fn resolve_shutdown(&self) {
        self.resolve(Err(BuildError::Recoverable(SHUT_DOWN_EARLY.to_string())));
    }
}

/// Receivers of every outcome applied after they subscribed.
#[derive(Clone, Default)]
pub struct Subscribers {
    senders: Arc<Mutex<Vec<Sender<BuildOutcome>>>>,
}

impl Subscribers {
    pub fn subscribe(&self) -> Receiver<BuildOutcome> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    fn publish(&self, outcome: &BuildOutcome) {
        // Dropped receivers unsubscribe.
        self.senders.lock().retain(|tx| tx.send(outcome.clone()).is_ok());
    }
}

/// Fold one outcome into the served state.
pub fn apply_outcome(state: &ServerStateCell, outcome: &BuildOutcome) {
    state.update(|state: &mut ServerState| {
        state.ready = true;
        match &outcome.error {
            None => {
                state.last_good_generation = outcome.generation;
                state.last_good_output_root = Some(outcome.output_root.clone());
                state.current_error = None;
            }
            Some(err) => {
                state.current_error = Some(strip_error_prefix(err.message()).into_owned());
            }
        }
    });
}

/// Apply outcomes until the coordinator stops or shutdown is requested.
pub async fn run_applier(
    mut outcomes: mpsc::UnboundedReceiver<BuildOutcome>,
    state: Arc<ServerStateCell>,
    ready: ReadyHandle,
    subscribers: Subscribers,
    shutdown: ShutdownHandle,
) {
    let token = shutdown.token();
    loop {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            outcome = outcomes.recv() => match outcome {
                Some(outcome) => outcome,
                None => break,
            },
        };

        apply_outcome(&state, &outcome);
        ready.resolve(match &outcome.error {
            Some(err) => Err(err.clone()),
            None => Ok(outcome.generation),
        });
        subscribers.publish(&outcome);

        if let Some(err) = outcome.error.as_ref().filter(|err| err.is_fatal()) {
            crate::log!("error"; "{}", strip_error_prefix(&err.to_string()));
            shutdown.trigger();
            break;
        }
    }
    ready.resolve_shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::BuildKind;
    use std::path::PathBuf;

    fn outcome(generation: u64, error: Option<BuildError>) -> BuildOutcome {
        BuildOutcome {
            generation,
            kind: BuildKind::Partial,
            error,
            affected: Vec::new(),
            written: 0,
            removed: 0,
            output_root: PathBuf::from("/site/public"),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_failure_keeps_last_good() {
        let state = ServerStateCell::default();
        apply_outcome(&state, &outcome(1, None));
        apply_outcome(
            &state,
            &outcome(
                2,
                Some(BuildError::Recoverable(
                    "ERROR 2018/10/07 13:11:12 failed to parse data file".into(),
                )),
            ),
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.last_good_generation, 1);
        assert_eq!(
            snapshot.last_good_output_root.as_deref(),
            Some(PathBuf::from("/site/public").as_path())
        );
        assert_eq!(snapshot.current_error.as_deref(), Some("failed to parse data file"));
        assert!(snapshot.ready);

        apply_outcome(&state, &outcome(2, None));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.last_good_generation, 2);
        assert!(snapshot.current_error.is_none());
    }

    #[test]
    fn test_ready_resolves_once() {
        let ready = ReadyHandle::new();
        assert!(ready.wait_timeout(Duration::from_millis(10)).is_none());

        ready.resolve(Ok(1));
        ready.resolve_shutdown();
        assert_eq!(ready.wait(), Ok(1));
    }

    #[test]
    fn test_subscribers_drop_closed_receivers() {
        let subscribers = Subscribers::default();
        let kept = subscribers.subscribe();
        drop(subscribers.subscribe());

        subscribers.publish(&outcome(1, None));
        assert_eq!(kept.try_recv().unwrap().generation, 1);
        assert_eq!(subscribers.senders.lock().len(), 1);
    }
}

//! FileSystem Actor
//!
//! Watches the site for changes and sends debounced events to the build
//! coordinator. The watcher starts before the first build so nothing edited
//! during it is lost.
//!
//! Architecture:
//! ```text
//! Watcher → Debouncer (pure timing) → Classifier (existence) → CoordinatorMsg
//! ```

use std::path::PathBuf;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::CoordinatorMsg;
use crate::config::SiteConfig;

// Reconciliation with the filesystem (raw changes -> change events).
mod classifier;
// Pure timing and deduplication.
mod debouncer;
// Watch root attach/re-attach lifecycle.
mod watch_roots;


use classifier::EventClassifier;
use debouncer::Debouncer;
use watch_roots::WatchRoots;

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Watch-root consistency layer (attach/re-attach root directories)
    watch_roots: WatchRoots,
    /// Channel to the build coordinator
    coordinator_tx: mpsc::Sender<CoordinatorMsg>,
    debouncer: Debouncer,
}

impl FsActor {
    /// Create a new FsActor.
    ///
    /// The watcher starts immediately, buffering events while the caller
    /// performs the initial build.
    pub fn new(
        roots: Vec<(PathBuf, RecursiveMode)>,
        coordinator_tx: mpsc::Sender<CoordinatorMsg>,
        debounce: Duration,
    ) -> notify::Result<Self> {
        // Create sync channel for notify (it doesn't support async)
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // Missing roots are re-attached once they appear
        let mut watch_roots = WatchRoots::new(roots);
        watch_roots.attach_existing(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            coordinator_tx,
            debouncer: Debouncer::new(debounce),
        })
    }

    /// Run the actor event loop until `token` is cancelled or the
    /// coordinator goes away.
    pub async fn run(self, token: CancellationToken) {
        let Self {
            notify_rx,
            mut watcher,
            mut watch_roots,
            coordinator_tx,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Poll notify events on a plain thread; it ends when the watcher
        // (and with it the sender) is dropped.
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    watch_roots.maintain(&mut watcher);
                    if process_changes(&mut debouncer, &coordinator_tx).await.is_err() {
                        break;
                    }
                }
            }
        }
        crate::debug!("watch"; "stopped");
    }
}

/// Directories to watch for `config`.
///
/// Input directories are watched recursively; the site root only for its
/// direct children so config edits and newly created input directories are
/// seen without reporting every output write.
pub fn watch_roots(config: &SiteConfig) -> Vec<(PathBuf, RecursiveMode)> {
    let mut roots: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    for dir in [&config.build.content, &config.build.data, &config.build.layouts] {
        if !roots.iter().any(|(root, _)| dir.starts_with(root)) {
            roots.retain(|(root, _)| !root.starts_with(dir));
            roots.push((dir.clone(), RecursiveMode::Recursive));
        }
    }
    if !roots.iter().any(|(root, _)| root == &config.root) {
        roots.push((config.root.clone(), RecursiveMode::NonRecursive));
    }
    roots
}

/// Process debounced file changes.
///
/// Returns `Err(())` if the coordinator shut down.
async fn process_changes(
    debouncer: &mut Debouncer,
    coordinator_tx: &mpsc::Sender<CoordinatorMsg>,
) -> Result<(), ()> {
    let Some(raw_events) = debouncer.take_if_ready() else {
        return Ok(());
    };

    let events = EventClassifier::classify(raw_events);
    if events.is_empty() {
        return Ok(());
    }

    for event in &events {
        crate::debug!("watch"; "{}: {}", event.kind.name(), event.path.display());
    }

    coordinator_tx
        .send(CoordinatorMsg::Changes(events))
        .await
        .map_err(|_| ())
}

//! Watch lifecycle, event routing, and eviction.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, RwLock, mpsc, watch as signal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Watch;
use crate::error::{Result, WatchError};
use crate::event::{self, WatchEvent};
use crate::index::FileIndex;
use crate::policy;
use crate::scan;

/// Delay between retries of a failed subscription or initial scan.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Buffered raw events per channel.
const EVENT_BUFFER: usize = 1024;

/// Lifecycle of a single watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Subscribing and scanning; eviction has not run yet.
    Initializing,

    /// Seeded and processing live events.
    Active,

    /// Torn down by reload or shutdown.
    Stopped,
}

/// A running watch as seen by the router and the supervisor.
struct WatchHandle {
    watch: Arc<Watch>,
    raw_tx: mpsc::Sender<Event>,
    shutdown_tx: signal::Sender<bool>,
    state_rx: signal::Receiver<WatchState>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Whether any of the event's paths fall directly inside this watch's
    /// directory.
    fn wants(&self, event: &Event) -> bool {
        event
            .paths
            .iter()
            .any(|path| path.parent() == Some(self.watch.directory()))
    }
}

/// Owns the set of active watches and the notify backend.
///
/// Each watch runs as its own task holding its [`FileIndex`] exclusively,
/// fed by a per-watch channel. A router task reads the single multiplexed
/// notify stream and forwards every event to the watches whose directory
/// it touches, so per-directory ordering follows notify's delivery order
/// while a slow watch only stalls itself.
pub struct WatchManager {
    watcher: Arc<Mutex<RecommendedWatcher>>,
    registry: Arc<RwLock<HashMap<String, WatchHandle>>>,
    router: JoinHandle<()>,
}

impl WatchManager {
    /// Create the manager, its notify backend, and the routing task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel(EVENT_BUFFER);

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(err) = raw_tx.blocking_send(event) {
                        error!("failed to forward filesystem event: {err}");
                    }
                }
                Err(err) => {
                    error!("watch error: {err}");
                }
            },
        )?;

        let registry = Arc::new(RwLock::new(HashMap::new()));
        let router = tokio::spawn(route_events(raw_rx, Arc::clone(&registry)));

        Ok(Self {
            watcher: Arc::new(Mutex::new(watcher)),
            registry,
            router,
        })
    }

    /// Start a watch. Fails when one with the same name is already
    /// running.
    pub async fn insert(&self, watch: Watch) -> Result<()> {
        let name = watch.name().to_string();
        let mut registry = self.registry.write().await;
        if registry.contains_key(&name) {
            return Err(WatchError::AlreadyWatching(name));
        }

        let watch = Arc::new(watch);
        let (raw_tx, raw_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = signal::channel(false);
        let (state_tx, state_rx) = signal::channel(WatchState::Initializing);

        let task = tokio::spawn(run_watch(
            Arc::clone(&watch),
            Arc::clone(&self.watcher),
            raw_rx,
            shutdown_rx,
            state_tx,
        ));

        registry.insert(
            name,
            WatchHandle {
                watch,
                raw_tx,
                shutdown_tx,
                state_rx,
                task,
            },
        );
        Ok(())
    }

    /// Stop a watch, returning whether it existed. The watch's directory
    /// is unsubscribed unless another watch still uses it; an in-flight
    /// eviction pass is allowed to finish, but its results die with the
    /// watch.
    pub async fn remove(&self, name: &str) -> bool {
        let handle = { self.registry.write().await.remove(name) };
        let Some(handle) = handle else {
            return false;
        };

        let _ = handle.shutdown_tx.send(true);

        let directory = handle.watch.directory().to_path_buf();
        let still_watched = self
            .registry
            .read()
            .await
            .values()
            .any(|other| other.watch.directory() == directory.as_path());
        if !still_watched {
            let _ = self.watcher.lock().await.unwatch(&directory);
        }

        let _ = handle.task.await;
        info!(watch = %name, "watch stopped");
        true
    }

    /// Whether a watch with this name is running.
    pub async fn contains(&self, name: &str) -> bool {
        self.registry.read().await.contains_key(name)
    }

    /// Current lifecycle state of a watch.
    pub async fn state(&self, name: &str) -> Option<WatchState> {
        self.registry
            .read()
            .await
            .get(name)
            .map(|handle| *handle.state_rx.borrow())
    }

    /// Spec of a running watch.
    pub async fn spec(&self, name: &str) -> Option<crate::config::WatchSpec> {
        self.registry
            .read()
            .await
            .get(name)
            .map(|handle| handle.watch.spec.clone())
    }

    /// Number of running watches.
    pub async fn len(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Whether no watches are running.
    pub async fn is_empty(&self) -> bool {
        self.registry.read().await.is_empty()
    }

    /// Stop every watch and the routing task.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.registry.read().await.keys().cloned().collect();
        for name in names {
            self.remove(&name).await;
        }
        self.router.abort();
    }
}

/// Forward raw notify events to every watch whose directory they touch.
///
/// The routing decision happens under the registry lock, so a reload never
/// routes an event to a half-torn-down watch; a send that loses the race
/// with teardown is simply discarded.
async fn route_events(
    mut raw_rx: mpsc::Receiver<Event>,
    registry: Arc<RwLock<HashMap<String, WatchHandle>>>,
) {
    while let Some(event) = raw_rx.recv().await {
        let targets: Vec<mpsc::Sender<Event>> = {
            let registry = registry.read().await;
            registry
                .values()
                .filter(|handle| handle.wants(&event))
                .map(|handle| handle.raw_tx.clone())
                .collect()
        };

        for tx in targets {
            let _ = tx.send(event.clone()).await;
        }
    }
}

/// Body of one watch task: subscribe, seed, then process live events.
async fn run_watch(
    watch: Arc<Watch>,
    watcher: Arc<Mutex<RecommendedWatcher>>,
    mut raw_rx: mpsc::Receiver<Event>,
    mut shutdown_rx: signal::Receiver<bool>,
    state_tx: signal::Sender<WatchState>,
) {
    // Subscribe before scanning: changes landing mid-scan queue up in the
    // channel and are replayed once the seed completes.
    loop {
        let subscribed = watcher
            .lock()
            .await
            .watch(watch.directory(), RecursiveMode::NonRecursive);
        match subscribed {
            Ok(()) => break,
            Err(err) => {
                warn!(
                    watch = %watch.name(),
                    error = %err,
                    "subscription failed, retrying"
                );
                if wait_or_shutdown(&mut shutdown_rx, RETRY_DELAY).await {
                    let _ = state_tx.send(WatchState::Stopped);
                    return;
                }
            }
        }
    }

    let mut index = FileIndex::new();
    if !seed_from_scan(&watch, &mut index, &mut shutdown_rx).await {
        let _ = state_tx.send(WatchState::Stopped);
        return;
    }

    let _ = state_tx.send(WatchState::Active);
    info!(
        watch = %watch.name(),
        directory = %watch.directory().display(),
        tracked = index.len(),
        "watch active"
    );
    evict(&watch, &mut index).await;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            received = raw_rx.recv() => match received {
                Some(raw) => {
                    for event in event::translate(&watch, &raw) {
                        apply(&watch, &mut index, event).await;
                    }
                }
                None => break,
            },
        }
    }

    let _ = state_tx.send(WatchState::Stopped);
    debug!(watch = %watch.name(), "watch task exiting");
}

/// Scan until it succeeds, seeding the index. Returns false when shutdown
/// was signalled first; the watch then stays short of `Active`, so no
/// eviction ever runs against a partially populated index.
async fn seed_from_scan(
    watch: &Arc<Watch>,
    index: &mut FileIndex,
    shutdown_rx: &mut signal::Receiver<bool>,
) -> bool {
    loop {
        let scan_watch = Arc::clone(watch);
        match tokio::task::spawn_blocking(move || scan::scan_directory(&scan_watch)).await {
            Ok(Ok(entries)) => {
                index.seed(entries);
                return true;
            }
            Ok(Err(err)) => {
                warn!(watch = %watch.name(), error = %err, "initial scan failed, retrying");
            }
            Err(err) => {
                error!(watch = %watch.name(), error = %err, "scan task aborted");
            }
        }
        if wait_or_shutdown(shutdown_rx, RETRY_DELAY).await {
            return false;
        }
    }
}

/// Sleep for `delay`, returning true when shutdown is signalled first.
async fn wait_or_shutdown(shutdown_rx: &mut signal::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_rx.changed() => true,
    }
}

/// Apply one translated event to the index, then re-evaluate the limit if
/// the index changed.
async fn apply(watch: &Arc<Watch>, index: &mut FileIndex, event: WatchEvent) {
    let mutated = match event {
        WatchEvent::Created(path) => record_created(watch, index, path).await,
        WatchEvent::Removed(path) => index.on_removed(&path),
        WatchEvent::Renamed { from, to } => {
            if index.rename(&from, to.clone()) {
                true
            } else {
                // Untracked source: treat the destination as new.
                record_created(watch, index, to).await
            }
        }
        WatchEvent::Rescan => {
            warn!(watch = %watch.name(), "event overflow, rescanning");
            let scan_watch = Arc::clone(watch);
            match tokio::task::spawn_blocking(move || scan::scan_directory(&scan_watch)).await {
                Ok(Ok(entries)) => {
                    index.seed(entries);
                    true
                }
                Ok(Err(err)) => {
                    warn!(watch = %watch.name(), error = %err, "rescan failed, keeping index");
                    false
                }
                Err(err) => {
                    error!(watch = %watch.name(), error = %err, "rescan task aborted");
                    false
                }
            }
        }
    };

    if mutated {
        evict(watch, index).await;
    }
}

/// Stat `path` and record it in the index, returning whether the index
/// changed. A path that vanished before the event was applied is
/// reconciled away, in case its Removed event was lost.
async fn record_created(watch: &Watch, index: &mut FileIndex, path: std::path::PathBuf) -> bool {
    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {
            let sort_key = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            index.on_created(path, sort_key);
            true
        }
        // Subdirectories and other non-regular entries are never counted.
        Ok(_) => index.on_removed(&path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => index.on_removed(&path),
        Err(err) => {
            warn!(
                watch = %watch.name(),
                path = %path.display(),
                error = %err,
                "stat failed"
            );
            false
        }
    }
}

/// Run one eviction pass: delete the oldest files until the count is back
/// at `keep`.
///
/// The delete goes to the filesystem first; the index drops the entry only
/// on confirmed success or when the file is already gone. Any other
/// failure leaves the entry tracked, to be retried on the next pass.
async fn evict(watch: &Watch, index: &mut FileIndex) {
    let count = policy::evaluate(index.len(), watch.spec.keep, watch.spec.max);
    if count == 0 {
        return;
    }

    debug!(
        watch = %watch.name(),
        tracked = index.len(),
        count,
        "limit exceeded, evicting oldest files"
    );

    for victim in index.oldest(count) {
        match tokio::fs::remove_file(&victim.path).await {
            Ok(()) => {
                index.on_removed(&victim.path);
                info!(
                    watch = %watch.name(),
                    path = %victim.path.display(),
                    "deleted file"
                );
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                index.on_removed(&victim.path);
                debug!(
                    watch = %watch.name(),
                    path = %victim.path.display(),
                    "file already removed"
                );
            }
            Err(err) => {
                warn!(
                    watch = %watch.name(),
                    path = %victim.path.display(),
                    error = %err,
                    "delete failed, keeping file indexed"
                );
            }
        }
    }
}

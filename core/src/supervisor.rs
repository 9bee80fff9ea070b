//! Reconciliation of configuration snapshots against running watches.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::WatchSpec;
use crate::error::Result;
use crate::manager::{WatchManager, WatchState};

/// Keeps the set of running watches aligned with the most recently loaded
/// configuration.
pub struct Supervisor {
    manager: WatchManager,
    specs: HashMap<String, WatchSpec>,
}

impl Supervisor {
    /// Create a supervisor with no watches.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        Ok(Self {
            manager: WatchManager::new()?,
            specs: HashMap::new(),
        })
    }

    /// Bring the running watches in line with `snapshot`.
    ///
    /// Unseen names are started, changed specs are torn down and recreated
    /// (a full replace, not an incremental patch), and names absent from
    /// the snapshot are stopped. A section that fails validation is
    /// skipped with a warning; the rest of the snapshot still applies.
    /// Returns the number of watches running afterwards.
    pub async fn apply(&mut self, snapshot: Vec<WatchSpec>) -> usize {
        let mut desired: HashMap<String, WatchSpec> = HashMap::new();
        for spec in snapshot {
            let name = spec.name.clone();
            if desired.insert(name.clone(), spec).is_some() {
                warn!(watch = %name, "duplicate watch name, keeping the last definition");
            }
        }

        // Stop watches whose section disappeared.
        let stopped: Vec<String> = self
            .specs
            .keys()
            .filter(|name| !desired.contains_key(*name))
            .cloned()
            .collect();
        for name in stopped {
            self.manager.remove(&name).await;
            self.specs.remove(&name);
        }

        for (name, spec) in desired {
            let unchanged = self.specs.get(&name).is_some_and(|current| *current == spec);
            if unchanged {
                continue;
            }
            // Changed spec: tear down and recreate rather than patch.
            if self.specs.remove(&name).is_some() {
                self.manager.remove(&name).await;
            }

            match spec.clone().compile() {
                Ok(watch) => match self.manager.insert(watch).await {
                    Ok(()) => {
                        info!(watch = %name, "watch started");
                        self.specs.insert(name, spec);
                    }
                    Err(err) => {
                        warn!(watch = %name, error = %err, "failed to start watch");
                    }
                },
                Err(err) => {
                    warn!(watch = %name, error = %err, "invalid watch section, skipping");
                }
            }
        }

        self.manager.len().await
    }

    /// Number of running watches.
    pub async fn watch_count(&self) -> usize {
        self.manager.len().await
    }

    /// Current lifecycle state of a watch.
    pub async fn watch_state(&self, name: &str) -> Option<WatchState> {
        self.manager.state(name).await
    }

    /// Stop all watches and the event router.
    pub async fn shutdown(&mut self) {
        self.manager.shutdown().await;
        self.specs.clear();
    }
}

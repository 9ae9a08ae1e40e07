//! Rules file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::store::SnapshotStore;

/// Watches the rules file and swaps the store snapshot on change.
///
/// The returned watcher must be kept alive for notifications to keep
/// flowing; dropping it stops the reloads.
pub struct RulesWatcher {
    path: PathBuf,
    store: Arc<SnapshotStore>,
}

impl RulesWatcher {
    pub fn new(path: &Path, store: Arc<SnapshotStore>) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
        }
    }

    /// Start watching in a background thread owned by `notify`.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let store = self.store;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "rules file changed, reloading");
                        if let Err(e) = store.reload(&path) {
                            // Keep serving the last good snapshot.
                            tracing::error!(error = %e, "rules reload rejected");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "rules watcher error");
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

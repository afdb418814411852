//! Local dataset configuration watcher.
//!
//! Watches the directory holding a local configuration file (editors often
//! replace files rather than write in place) and marks the store's check
//! interval as elapsed when the file changes.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::datasets::{ConfigStore, Revalidation};

/// A watcher that monitors the dataset configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    store: Arc<ConfigStore>,
    change_tx: mpsc::UnboundedSender<PathBuf>,
}

impl ConfigWatcher {
    /// Create a watcher for `store`'s source. Returns `None` for remote sources.
    ///
    /// The receiver yields the path of every relevant change event.
    pub fn new(store: Arc<ConfigStore>) -> Option<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let path = store.location().local_path()?.clone();
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        Some((
            Self {
                path,
                store,
                change_tx,
            },
            change_rx,
        ))
    }

    /// Start watching in a background thread. Dropping the returned handle
    /// stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let store = self.store.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                        return;
                    }
                    let relevant = event
                        .paths
                        .iter()
                        .find(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if let Some(path) = relevant {
                        tracing::debug!(path = %path.display(), "Dataset config change detected");
                        store.expire_check();
                        let _ = tx.send(path.clone());
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let directory = watch_directory(&self.path);
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Dataset config watcher started");
        Ok(watcher)
    }
}

fn watch_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Revalidate the store for each change event until shutdown. Bursts of
/// events are coalesced into one revalidation.
pub async fn revalidate_on_change(
    store: Arc<ConfigStore>,
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(path) = change else { break };
                while changes.try_recv().is_ok() {}

                match store.force_revalidate().await {
                    Revalidation::Replaced { datasets } => {
                        tracing::info!(path = %path.display(), datasets, "Reloaded dataset config after file change");
                    }
                    outcome => tracing::debug!(path = %path.display(), ?outcome, "File change revalidated"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Dataset config watcher stopped");
}

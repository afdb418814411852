//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: loader registration errors and missing required datasets are fatal
//! - Subsystems initialize in order: registry, config store, cache
//! - Background tasks (watcher, sweeper) start after the services exist

use notify::RecommendedWatcher;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::cache::DatasetCache;
use crate::config::watcher::{revalidate_on_change, ConfigWatcher};
use crate::config::Settings;
use crate::datasets::{ConfigStore, Revalidation};
use crate::lifecycle::Shutdown;
use crate::loaders::{LoaderCatalog, LoaderRegistrationError, LoaderRegistry};
use crate::source::{ReadSource, SourceError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("loader registration failed: {0}")]
    Registration(#[from] LoaderRegistrationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("datasets are required but {path} could not be loaded: {reason}")]
    DatasetsUnavailable { path: String, reason: String },

    #[error("datasets are required but {path} declares none")]
    NoDatasets { path: String },

    #[error("failed to watch dataset config: {0}")]
    Watcher(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Long-lived services, constructed once and shared by reference.
#[derive(Clone)]
pub struct Services {
    pub settings: Arc<Settings>,
    pub registry: Arc<LoaderRegistry>,
    pub store: Arc<ConfigStore>,
    pub cache: Arc<DatasetCache>,
}

/// Build registry → config store → cache.
pub async fn bootstrap(
    settings: Settings,
    catalog: &LoaderCatalog,
    reader: Arc<dyn ReadSource>,
) -> Result<Services, StartupError> {
    let registry = Arc::new(catalog.build_registry(settings.loaders.ids())?);
    tracing::info!(
        loaders = registry.len(),
        prefixes = ?registry.prefixes(),
        "Dataset loaders registered"
    );

    let path = settings.datasets.config_path.clone();
    let (store, outcome) =
        ConfigStore::open(&path, reader, settings.datasets.config_check_interval()).await?;

    if settings.datasets.require_datasets {
        match outcome {
            Revalidation::SourceFailed(e) => {
                return Err(StartupError::DatasetsUnavailable {
                    path,
                    reason: e.to_string(),
                })
            }
            Revalidation::ParseFailed(e) => {
                return Err(StartupError::DatasetsUnavailable {
                    path,
                    reason: e.to_string(),
                })
            }
            _ if store.current().is_empty() => return Err(StartupError::NoDatasets { path }),
            _ => {}
        }
    }

    let store = Arc::new(store);
    let cache = Arc::new(
        DatasetCache::new(store.clone(), registry.clone(), settings.datasets.cache_ttl())
            .with_max_variants(settings.datasets.max_cached_variants),
    );

    tracing::info!(
        source = %path,
        datasets = store.current().len(),
        config_ttl_secs = settings.datasets.config_cache_ttl_secs,
        data_ttl_secs = settings.datasets.cache_ttl_secs,
        max_cached_variants = settings.datasets.max_cached_variants,
        "Dataset services ready"
    );

    Ok(Services {
        settings: Arc::new(settings),
        registry,
        store,
        cache,
    })
}

/// Start the config watcher (local sources only) and the cache sweeper.
///
/// The returned watcher must be kept alive for the watch to continue.
pub fn start_background_tasks(
    services: &Services,
    shutdown: &Shutdown,
) -> Result<Option<RecommendedWatcher>, StartupError> {
    tokio::spawn(sweep_periodically(
        services.cache.clone(),
        Duration::from_secs(services.settings.datasets.sweep_interval_secs),
        shutdown.subscribe(),
    ));

    if !services.settings.datasets.watch_local {
        return Ok(None);
    }
    let Some((watcher, changes)) = ConfigWatcher::new(services.store.clone()) else {
        return Ok(None);
    };

    let handle = watcher.run()?;
    tokio::spawn(revalidate_on_change(
        services.store.clone(),
        changes,
        shutdown.subscribe(),
    ));
    Ok(Some(handle))
}

/// Drop expired and orphaned cache entries every `every` until shutdown.
pub async fn sweep_periodically(
    cache: Arc<DatasetCache>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cache.sweep();
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Cache sweeper stopped");
}

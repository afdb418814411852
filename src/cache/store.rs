//! Dataset cache.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::cache::entry::{CacheEntry, CacheKey, Staleness};
use crate::datasets::{ConfigSnapshot, ConfigStore};
use crate::loaders::{Frame, LoaderFailure, LoaderRegistry};
use crate::observability::metrics;
use crate::query::ResolvedParameters;

/// Parameter variants kept per dataset unless configured otherwise.
pub const DEFAULT_MAX_VARIANTS: usize = 32;

#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("no such dataset: '{0}'")]
    NotFound(String),

    #[error("failed to load dataset '{name}': {source}")]
    LoaderFailure {
        name: String,
        #[source]
        source: LoaderFailure,
    },
}

/// Loaded payloads keyed by dataset name and payload-affecting parameters.
///
/// Every lookup consults the [`ConfigStore`] first, so removed datasets are
/// never served and edited definitions reload at the config check cadence.
pub struct DatasetCache {
    store: Arc<ConfigStore>,
    registry: Arc<LoaderRegistry>,
    ttl: Duration,
    max_variants: usize,
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    seen_generation: AtomicU64,
}

impl DatasetCache {
    pub fn new(store: Arc<ConfigStore>, registry: Arc<LoaderRegistry>, ttl: Duration) -> Self {
        Self {
            store,
            registry,
            ttl,
            max_variants: DEFAULT_MAX_VARIANTS,
            entries: DashMap::new(),
            seen_generation: AtomicU64::new(0),
        }
    }

    /// Cap the number of parameter variants cached per dataset name.
    /// The oldest loads are evicted first. Zero is treated as one.
    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = max_variants.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_variants(&self) -> usize {
        self.max_variants
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<LoaderRegistry> {
        &self.registry
    }

    /// Payload for `name` without query parameters.
    pub async fn get(&self, name: &str) -> Result<Arc<Frame>, LoadError> {
        self.lookup(name, &ResolvedParameters::default())
            .await
            .map(|entry| entry.payload.clone())
    }

    /// Entry for `name`, loading it if absent, expired or defined differently.
    ///
    /// A failed load keeps any previous entry and is not remembered.
    pub async fn lookup(
        &self,
        name: &str,
        params: &ResolvedParameters,
    ) -> Result<Arc<CacheEntry>, LoadError> {
        let snapshot = self.store.snapshot().await;
        self.evict_removed(&snapshot);

        let definition = snapshot
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        let failure = |source: LoaderFailure| LoadError::LoaderFailure {
            name: name.to_string(),
            source,
        };

        let loader = self.registry.resolve(&definition).map_err(failure)?;
        let bucket = params.bucket_for(definition.loader.as_deref());
        let key = CacheKey::new(name, loader.keyed_params(bucket));
        let fingerprint = definition.fingerprint();

        let cached = self.entries.get(&key).map(|r| r.value().clone());
        let staleness = match &cached {
            Some(entry) => entry.staleness(&fingerprint, self.ttl),
            None => Staleness::Expired,
        };
        if let (Some(entry), Staleness::Fresh) = (&cached, staleness) {
            metrics::record_cache_lookup("hit");
            return Ok(entry.clone());
        }
        metrics::record_cache_lookup(if cached.is_some() { staleness.as_str() } else { "miss" });

        let started = Instant::now();
        let result = loader.load(&definition, bucket).await;
        metrics::record_load(loader.id(), result.is_ok(), started.elapsed());

        match result {
            Ok(frame) => {
                let entry = Arc::new(CacheEntry {
                    name: name.to_string(),
                    definition: definition.clone(),
                    fingerprint,
                    loader: loader.id().to_string(),
                    params: key.params.clone(),
                    payload: Arc::new(frame),
                    loaded_at: Instant::now(),
                });
                tracing::info!(
                    dataset = %name,
                    loader = %loader.id(),
                    rows = entry.payload.len(),
                    reason = if cached.is_some() { staleness.as_str() } else { "miss" },
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Dataset loaded"
                );
                self.entries.insert(key, entry.clone());
                self.limit_variants(name);
                metrics::record_cache_size(self.entries.len());
                Ok(entry)
            }
            Err(error) => {
                tracing::warn!(
                    dataset = %name,
                    loader = %loader.id(),
                    error = %error,
                    retained = cached.is_some(),
                    "Dataset load failed"
                );
                Err(failure(error))
            }
        }
    }

    /// Drop entries whose dataset is gone or whose data TTL elapsed.
    pub fn sweep(&self) -> usize {
        let snapshot = self.store.current();
        let before = self.entries.len();
        self.entries
            .retain(|key, entry| snapshot.contains(&key.name) && entry.age() < self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept dataset cache");
            metrics::record_cache_size(self.entries.len());
        }
        removed
    }

    /// Drop every entry of `name`.
    pub fn invalidate(&self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.name != name);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached entries of `name`, for inspection.
    pub fn entries_for(&self, name: &str) -> Vec<Arc<CacheEntry>> {
        self.entries
            .iter()
            .filter(|r| r.key().name == name)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Evict the oldest variants of `name` beyond `max_variants`.
    fn limit_variants(&self, name: &str) -> usize {
        let mut variants: Vec<(CacheKey, Instant)> = self
            .entries
            .iter()
            .filter(|r| r.key().name == name)
            .map(|r| (r.key().clone(), r.value().loaded_at))
            .collect();
        if variants.len() <= self.max_variants {
            return 0;
        }

        variants.sort_by_key(|(_, loaded_at)| *loaded_at);
        let excess = variants.len() - self.max_variants;
        for (key, _) in variants.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        tracing::debug!(
            dataset = %name,
            evicted = excess,
            max_variants = self.max_variants,
            "Evicted oldest parameter variants"
        );
        excess
    }

    /// Evict names missing from `snapshot`, once per new snapshot generation.
    fn evict_removed(&self, snapshot: &ConfigSnapshot) {
        let previous = self.seen_generation.fetch_max(snapshot.generation, Ordering::AcqRel);
        if previous >= snapshot.generation {
            return;
        }

        let before = self.entries.len();
        self.entries.retain(|key, _| snapshot.contains(&key.name));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::info!(
                removed,
                generation = snapshot.generation,
                "Evicted cache entries of removed datasets"
            );
            metrics::record_cache_size(self.entries.len());
        }
    }
}

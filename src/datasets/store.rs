//! Cached, periodically revalidated view of the dataset configuration.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::datasets::definition::DatasetDefinition;
use crate::datasets::fingerprint::Fingerprint;
use crate::datasets::parser::{parse_definitions, ConfigParseError};
use crate::observability::metrics;
use crate::source::{ReadSource, SourceError, SourceLocation, WarnLatch};

/// One successful parse. Never mutated; replaced whole.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// `name → definition`.
    pub datasets: BTreeMap<String, Arc<DatasetDefinition>>,

    /// Names in declaration order.
    pub order: Vec<String>,

    /// Digest of the raw content. `None` until a source read has succeeded.
    pub fingerprint: Option<Fingerprint>,

    pub captured_at: DateTime<Utc>,

    /// Increases by one with every replacement.
    pub generation: u64,
}

impl ConfigSnapshot {
    /// Snapshot served before the first successful read.
    pub fn empty() -> Self {
        Self {
            datasets: BTreeMap::new(),
            order: Vec::new(),
            fingerprint: None,
            captured_at: Utc::now(),
            generation: 0,
        }
    }

    /// Snapshot of `definitions`, which are in declaration order.
    pub fn from_definitions(
        definitions: Vec<Arc<DatasetDefinition>>,
        fingerprint: Option<Fingerprint>,
        generation: u64,
    ) -> Self {
        Self {
            order: definitions.iter().map(|d| d.name.clone()).collect(),
            datasets: definitions.into_iter().map(|d| (d.name.clone(), d)).collect(),
            fingerprint,
            captured_at: Utc::now(),
            generation,
        }
    }

    /// Definitions in declaration order.
    pub fn ordered(&self) -> impl Iterator<Item = &Arc<DatasetDefinition>> + '_ {
        self.order.iter().filter_map(|name| self.datasets.get(name))
    }

    /// The `index`-th declared dataset.
    pub fn nth(&self, index: usize) -> Option<&Arc<DatasetDefinition>> {
        self.order.get(index).and_then(|name| self.datasets.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DatasetDefinition>> {
        self.datasets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Outcome of one revalidation attempt.
#[derive(Debug)]
pub enum Revalidation {
    /// Another caller is already revalidating.
    Skipped,
    /// Raw content is byte-identical to the held snapshot's.
    Unchanged,
    /// A new snapshot was swapped in.
    Replaced { datasets: usize },
    /// Source unreachable; held snapshot kept.
    SourceFailed(SourceError),
    /// Content changed but did not parse; held snapshot kept.
    ParseFailed(ConfigParseError),
}

/// Owns the current [`ConfigSnapshot`].
///
/// Reads inside the check interval return the held snapshot without touching
/// the source. The first read past the interval fetches and fingerprints the
/// source, and reparses only when the fingerprint differs.
pub struct ConfigStore {
    source_path: String,
    location: SourceLocation,
    reader: Arc<dyn ReadSource>,
    check_interval: Duration,
    current: ArcSwap<ConfigSnapshot>,
    last_check: Mutex<Option<Instant>>,
    revalidating: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    source_warnings: WarnLatch,
}

impl ConfigStore {
    /// Create a store that has not read its source yet.
    pub fn new(
        source_path: &str,
        reader: Arc<dyn ReadSource>,
        check_interval: Duration,
    ) -> Result<Self, SourceError> {
        let location = SourceLocation::parse(source_path)?;
        Ok(Self {
            source_path: source_path.to_string(),
            location,
            reader,
            check_interval,
            current: ArcSwap::from_pointee(ConfigSnapshot::empty()),
            last_check: Mutex::new(None),
            revalidating: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            source_warnings: WarnLatch::new(),
        })
    }

    /// Create a store and perform the initial read.
    ///
    /// A failed initial read still yields a usable (empty) store; the caller
    /// decides from the returned outcome whether that is fatal.
    pub async fn open(
        source_path: &str,
        reader: Arc<dyn ReadSource>,
        check_interval: Duration,
    ) -> Result<(Self, Revalidation), SourceError> {
        let store = Self::new(source_path, reader, check_interval)?;
        let outcome = store.force_revalidate().await;
        Ok((store, outcome))
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Current snapshot, revalidating first if the check interval elapsed.
    pub async fn snapshot(&self) -> Arc<ConfigSnapshot> {
        if self.claim_check() {
            if let Ok(_guard) = self.revalidating.try_lock() {
                self.revalidate_locked().await;
            }
        }
        self.current.load_full()
    }

    /// Held snapshot, never touching the source.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Revalidate now, regardless of the check interval.
    pub async fn force_revalidate(&self) -> Revalidation {
        let _guard = self.revalidating.lock().await;
        *self.last_check.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.revalidate_locked().await
    }

    /// Make the next [`snapshot`](Self::snapshot) call revalidate.
    pub fn expire_check(&self) {
        *self.last_check.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of source warnings actually logged.
    pub fn source_warnings_emitted(&self) -> usize {
        self.source_warnings.emitted()
    }

    /// Returns `true` if the caller should revalidate, and stamps the check.
    fn claim_check(&self) -> bool {
        let mut last = self.last_check.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.check_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    async fn revalidate_locked(&self) -> Revalidation {
        let raw = match self.reader.read(&self.location).await {
            Ok(raw) => raw,
            Err(error) => {
                if self.source_warnings.failure(&error.to_string()) {
                    tracing::warn!(
                        source = %self.source_path,
                        error = %error,
                        datasets = self.current.load().len(),
                        "Dataset config unreachable; keeping last good snapshot"
                    );
                } else {
                    tracing::debug!(source = %self.source_path, "Dataset config still unreachable");
                }
                metrics::record_config_check("unreachable");
                return Revalidation::SourceFailed(error);
            }
        };

        if self.source_warnings.clear() {
            tracing::info!(source = %self.source_path, "Dataset config reachable again");
        }

        let fingerprint = Fingerprint::of(&raw);
        if self.current.load().fingerprint.as_ref() == Some(&fingerprint) {
            metrics::record_config_check("unchanged");
            return Revalidation::Unchanged;
        }

        match parse_definitions(&raw) {
            Ok(datasets) => {
                let count = datasets.len();
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                let snapshot =
                    ConfigSnapshot::from_definitions(datasets, Some(fingerprint.clone()), generation);
                self.current.store(Arc::new(snapshot));

                tracing::info!(
                    source = %self.source_path,
                    sha256 = %fingerprint.short(),
                    datasets = count,
                    generation,
                    "Dataset config loaded"
                );
                metrics::record_config_check("replaced");
                metrics::record_snapshot_size(count);
                Revalidation::Replaced { datasets: count }
            }
            Err(error) => {
                tracing::error!(
                    source = %self.source_path,
                    sha256 = %fingerprint.short(),
                    error = %error,
                    "Invalid dataset config; keeping last good snapshot"
                );
                metrics::record_config_check("invalid");
                Revalidation::ParseFailed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Scripted {
        content: Mutex<Result<Vec<u8>, SourceError>>,
        reads: AtomicUsize,
    }

    impl Scripted {
        fn new(raw: &str) -> Arc<Self> {
            Arc::new(Self {
                content: Mutex::new(Ok(raw.as_bytes().to_vec())),
                reads: AtomicUsize::new(0),
            })
        }

        fn set(&self, content: Result<&str, SourceError>) {
            *self.content.lock().unwrap() = content.map(|s| s.as_bytes().to_vec());
        }
    }

    #[async_trait]
    impl ReadSource for Scripted {
        async fn read(&self, _location: &SourceLocation) -> Result<Vec<u8>, SourceError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.content.lock().unwrap().clone()
        }
    }

    const SALES: &str = "[sales]\npath = \"sales.csv\"\nindex = \"ts\"\n";

    #[tokio::test]
    async fn test_reads_within_interval_are_cheap() {
        let source = Scripted::new(SALES);
        let store = ConfigStore::new("datasets.toml", source.clone(), Duration::from_secs(60)).unwrap();

        let first = store.snapshot().await;
        assert_eq!(first.len(), 1);
        assert_eq!(first.generation, 1);

        for _ in 0..5 {
            let again = store.snapshot().await;
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unchanged_content_keeps_snapshot() {
        let source = Scripted::new(SALES);
        let store = ConfigStore::new("datasets.toml", source.clone(), Duration::ZERO).unwrap();

        let first = store.snapshot().await;
        let second = store.snapshot().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
        assert!(matches!(store.force_revalidate().await, Revalidation::Unchanged));
    }

    #[tokio::test]
    async fn test_comment_edit_replaces_snapshot() {
        let source = Scripted::new(SALES);
        let store = ConfigStore::new("datasets.toml", source.clone(), Duration::from_secs(60)).unwrap();
        let first = store.snapshot().await;

        source.set(Ok(&format!("# edited\n{}", SALES)));
        assert!(matches!(
            store.force_revalidate().await,
            Revalidation::Replaced { datasets: 1 }
        ));
        let second = store.current();
        assert_ne!(first.fingerprint, second.fingerprint);
        assert_eq!(second.generation, 2);
    }

    #[tokio::test]
    async fn test_unreachable_source_keeps_snapshot_and_warns_once() {
        let source = Scripted::new(SALES);
        let store = ConfigStore::new("datasets.toml", source.clone(), Duration::ZERO).unwrap();
        let good = store.snapshot().await;

        source.set(Err(SourceError::NotFound("datasets.toml".into())));
        let during = store.snapshot().await;
        assert!(Arc::ptr_eq(&good, &during));
        assert_eq!(store.source_warnings_emitted(), 1);

        let still = store.snapshot().await;
        assert!(Arc::ptr_eq(&good, &still));
        assert_eq!(store.source_warnings_emitted(), 1);

        source.set(Err(SourceError::Timeout("datasets.toml".into())));
        store.snapshot().await;
        assert_eq!(store.source_warnings_emitted(), 2);
    }

    #[tokio::test]
    async fn test_parse_error_keeps_snapshot() {
        let source = Scripted::new(SALES);
        let store = ConfigStore::new("datasets.toml", source.clone(), Duration::from_secs(60)).unwrap();
        let good = store.snapshot().await;

        source.set(Ok("[sales\n"));
        assert!(matches!(
            store.force_revalidate().await,
            Revalidation::ParseFailed(ConfigParseError::Syntax(_))
        ));
        assert!(Arc::ptr_eq(&good, &store.current()));
    }

    #[tokio::test]
    async fn test_expire_check_forces_next_read() {
        let source = Scripted::new(SALES);
        let store = ConfigStore::new("datasets.toml", source.clone(), Duration::from_secs(3600)).unwrap();
        store.snapshot().await;
        store.snapshot().await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);

        store.expire_check();
        store.snapshot().await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_open_reads_once() {
        let source = Scripted::new(SALES);
        let (store, outcome) = ConfigStore::open("datasets.toml", source.clone(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(outcome, Revalidation::Replaced { datasets: 1 }));
        assert!(store.current().contains("sales"));

        store.snapshot().await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_scheme_fails_construction() {
        let source = Scripted::new(SALES);
        let err = ConfigStore::new("ftp://host/datasets.toml", source, Duration::ZERO)
            .err()
            .unwrap();
        assert_eq!(err, SourceError::UnsupportedScheme("ftp".into()));
    }
}

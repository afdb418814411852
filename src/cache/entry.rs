//! Cache keys and immutable cache entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::datasets::{DatasetDefinition, Fingerprint};
use crate::loaders::{Frame, ParamBucket};

/// Dataset name plus the parameters that shaped the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    pub params: ParamBucket,
}

impl CacheKey {
    pub fn new(name: impl Into<String>, params: ParamBucket) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// One loaded dataset. Replaced whole on reload, never mutated.
#[derive(Debug)]
pub struct CacheEntry {
    pub name: String,
    pub definition: Arc<DatasetDefinition>,

    /// Fingerprint of `definition` at load time.
    pub fingerprint: Fingerprint,

    pub loader: String,
    pub params: ParamBucket,
    pub payload: Arc<Frame>,
    pub loaded_at: Instant,
}

/// Why an entry could not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    /// The data TTL elapsed.
    Expired,
    /// The definition was edited since the entry was loaded.
    DefinitionChanged,
}

impl Staleness {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "hit",
            Self::Expired => "expired",
            Self::DefinitionChanged => "changed",
        }
    }
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    /// A changed definition outranks the TTL.
    pub fn staleness(&self, current: &Fingerprint, ttl: Duration) -> Staleness {
        if &self.fingerprint != current {
            Staleness::DefinitionChanged
        } else if self.age() >= ttl {
            Staleness::Expired
        } else {
            Staleness::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(definition: DatasetDefinition) -> CacheEntry {
        CacheEntry {
            name: definition.name.clone(),
            fingerprint: definition.fingerprint(),
            definition: Arc::new(definition),
            loader: "file".into(),
            params: ParamBucket::new(),
            payload: Arc::new(Frame::new("ts", vec![], vec![]).unwrap()),
            loaded_at: Instant::now(),
        }
    }

    #[test]
    fn test_staleness() {
        let definition = DatasetDefinition::new("sales", "sales.csv", "ts");
        let entry = entry(definition.clone());

        assert_eq!(
            entry.staleness(&definition.fingerprint(), Duration::from_secs(60)),
            Staleness::Fresh
        );
        assert_eq!(
            entry.staleness(&definition.fingerprint(), Duration::ZERO),
            Staleness::Expired
        );

        let mut edited = definition;
        edited.source_path = "sales-v2.csv".into();
        assert_eq!(
            entry.staleness(&edited.fingerprint(), Duration::from_secs(60)),
            Staleness::DefinitionChanged
        );
    }
}

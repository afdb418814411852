//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use time_fold_explorer::datasets::DatasetDefinition;
use time_fold_explorer::loaders::frame::Column;
use time_fold_explorer::loaders::{DatasetLoader, Frame, LoaderFailure, ParamBucket};
use time_fold_explorer::source::{ReadSource, SourceError, SourceLocation};

/// In-memory source keyed by resolved location.
#[derive(Default)]
pub struct MemorySource {
    files: Mutex<HashMap<String, Result<Vec<u8>, SourceError>>>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(location: &str) -> String {
        SourceLocation::parse(location).unwrap().to_string()
    }

    pub fn put(&self, location: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(Self::key(location), Ok(content.as_bytes().to_vec()));
    }

    pub fn fail(&self, location: &str, error: SourceError) {
        self.files.lock().unwrap().insert(Self::key(location), Err(error));
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadSource for MemorySource {
    async fn read(&self, location: &SourceLocation) -> Result<Vec<u8>, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let key = location.to_string();
        self.files
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(Err(SourceError::NotFound(key)))
    }
}

/// Loader returning a fixed two-row frame and counting its calls.
pub struct CountingLoader {
    id: String,
    prefix: Option<String>,
    calls: AtomicUsize,
}

impl CountingLoader {
    pub fn primary() -> Arc<Self> {
        Arc::new(Self {
            id: "counting".into(),
            prefix: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn prefixed(prefix: &str) -> Arc<Self> {
        Arc::new(Self {
            id: format!("counting-{}", prefix),
            prefix: Some(prefix.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetLoader for CountingLoader {
    fn id(&self) -> &str {
        &self.id
    }

    fn prefix(&self) -> Option<String> {
        self.prefix.clone()
    }

    async fn load(
        &self,
        definition: &DatasetDefinition,
        _params: &ParamBucket,
    ) -> Result<Frame, LoaderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Frame::from_records(
            &definition.index_column,
            vec![definition.index_column.clone(), "value".into()],
            vec![
                vec!["2019-05-11".into(), 1.into()],
                vec!["2019-05-12".into(), 2.into()],
            ],
        )
    }
}

/// Column helper for assertions.
pub fn values(frame: &Frame, column: &str) -> Vec<serde_json::Value> {
    frame
        .column(column)
        .map(|c: &Column| c.values.clone())
        .unwrap_or_default()
}

pub const CONFIG_PATH: &str = "local:///etc/explorer/datasets.toml";

/// One dataset section.
pub fn section(name: &str, path: &str, index: &str) -> String {
    format!("[{name}]\npath = \"{path}\"\nindex = \"{index}\"\n")
}

//! Implementation identifiers → loader factories.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::loaders::{
    DatasetLoader, FileLoader, GeneratorLoader, LoaderRegistrationError, LoaderRegistry,
};
use crate::source::ReadSource;

type Factory = Arc<dyn Fn() -> Arc<dyn DatasetLoader> + Send + Sync>;

/// Known loader implementations, selectable by identifier in settings.
#[derive(Clone, Default)]
pub struct LoaderCatalog {
    factories: BTreeMap<String, Factory>,
}

impl LoaderCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog with the `file` and `generator` loaders.
    pub fn builtin(reader: Arc<dyn ReadSource>) -> Self {
        let mut catalog = Self::empty();
        catalog.insert(FileLoader::ID, move || {
            Arc::new(FileLoader::new(reader.clone())) as Arc<dyn DatasetLoader>
        });
        catalog.insert(GeneratorLoader::ID, || {
            Arc::new(GeneratorLoader::new()) as Arc<dyn DatasetLoader>
        });
        catalog
    }

    /// Add or replace a factory.
    pub fn insert<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn DatasetLoader> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build a registry from the primary `file` loader (when cataloged) plus
    /// the listed implementations. Blank identifiers are skipped.
    pub fn build_registry<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<LoaderRegistry, LoaderRegistrationError> {
        let mut registry = LoaderRegistry::new();
        let mut seen = vec![FileLoader::ID];

        if let Some(factory) = self.factories.get(FileLoader::ID) {
            registry.register(factory())?;
        }

        for id in ids.into_iter().map(str::trim).filter(|id| !id.is_empty()) {
            if seen.contains(&id) {
                continue;
            }
            let factory = self
                .factories
                .get(id)
                .ok_or_else(|| LoaderRegistrationError::UnknownImplementation(id.to_string()))?;
            registry.register(factory())?;
            seen.push(id);
        }

        Ok(registry)
    }
}

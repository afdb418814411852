//! Prefix → loader routing, validated once at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::datasets::DatasetDefinition;
use crate::loaders::{DatasetLoader, LoaderFailure};
use crate::query::WIDGET_PARAMETERS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderRegistrationError {
    #[error("loader has an empty implementation identifier")]
    MissingIdentifier,

    #[error("loader '{id}' returned different prefixes ({first:?}, then {second:?})")]
    UnstablePrefix {
        id: String,
        first: Option<String>,
        second: Option<String>,
    },

    #[error("loader '{id}' has an empty prefix; return None for the primary loader")]
    EmptyPrefix { id: String },

    #[error("loader '{id}' prefix '{prefix}' must be ASCII alphanumeric")]
    InvalidPrefix { id: String, prefix: String },

    #[error("loader '{id}' prefix '{prefix}' collides with widget parameter '{parameter}'")]
    ReservedPrefix {
        id: String,
        prefix: String,
        parameter: String,
    },

    #[error("loader '{id}' is unprefixed but '{existing}' is already the primary loader")]
    DuplicatePrimary { existing: String, id: String },

    #[error("prefix '{prefix}' of loader '{id}' is already used by '{existing}'")]
    DuplicatePrefix {
        prefix: String,
        existing: String,
        id: String,
    },

    #[error("prefix '{prefix}' of loader '{id}' is ambiguous with '{other}'")]
    AmbiguousPrefix {
        prefix: String,
        other: String,
        id: String,
    },

    #[error("unknown loader implementation '{0}'")]
    UnknownImplementation(String),
}

/// One registered loader and the prefix it was registered under.
#[derive(Clone)]
pub struct LoaderRegistration {
    pub prefix: Option<String>,
    pub loader: Arc<dyn DatasetLoader>,
}

impl fmt::Debug for LoaderRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistration")
            .field("id", &self.loader.id())
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Immutable after startup; shared via `Arc`.
#[derive(Debug, Default, Clone)]
pub struct LoaderRegistry {
    primary: Option<LoaderRegistration>,
    prefixed: BTreeMap<String, LoaderRegistration>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every loader in order, stopping at the first error.
    pub fn from_loaders(
        loaders: impl IntoIterator<Item = Arc<dyn DatasetLoader>>,
    ) -> Result<Self, LoaderRegistrationError> {
        let mut registry = Self::new();
        for loader in loaders {
            registry.register(loader)?;
        }
        Ok(registry)
    }

    /// Add a loader under the prefix it reports.
    pub fn register(&mut self, loader: Arc<dyn DatasetLoader>) -> Result<(), LoaderRegistrationError> {
        let id = loader.id().to_string();
        if id.trim().is_empty() {
            return Err(LoaderRegistrationError::MissingIdentifier);
        }

        let first = loader.prefix();
        let second = loader.prefix();
        if first != second {
            return Err(LoaderRegistrationError::UnstablePrefix { id, first, second });
        }

        let Some(prefix) = first else {
            if let Some(existing) = &self.primary {
                return Err(LoaderRegistrationError::DuplicatePrimary {
                    existing: existing.loader.id().to_string(),
                    id,
                });
            }
            tracing::info!(loader = %id, "Registered primary dataset loader");
            self.primary = Some(LoaderRegistration { prefix: None, loader });
            return Ok(());
        };

        self.check_prefix(&id, &prefix)?;
        tracing::info!(loader = %id, prefix = %prefix, "Registered dataset loader");
        self.prefixed.insert(
            prefix.clone(),
            LoaderRegistration {
                prefix: Some(prefix),
                loader,
            },
        );
        Ok(())
    }

    fn check_prefix(&self, id: &str, prefix: &str) -> Result<(), LoaderRegistrationError> {
        if prefix.is_empty() {
            return Err(LoaderRegistrationError::EmptyPrefix { id: id.to_string() });
        }
        if let Some(existing) = self.prefixed.get(prefix) {
            return Err(LoaderRegistrationError::DuplicatePrefix {
                prefix: prefix.to_string(),
                existing: existing.loader.id().to_string(),
                id: id.to_string(),
            });
        }
        if let Some(other) = self
            .prefixed
            .keys()
            .find(|other| other.starts_with(prefix) || prefix.starts_with(other.as_str()))
        {
            return Err(LoaderRegistrationError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                other: other.clone(),
                id: id.to_string(),
            });
        }
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LoaderRegistrationError::InvalidPrefix {
                id: id.to_string(),
                prefix: prefix.to_string(),
            });
        }

        let namespace = format!("{}_", prefix);
        if let Some(parameter) = WIDGET_PARAMETERS.iter().find(|p| p.starts_with(&namespace)) {
            return Err(LoaderRegistrationError::ReservedPrefix {
                id: id.to_string(),
                prefix: prefix.to_string(),
                parameter: parameter.to_string(),
            });
        }

        Ok(())
    }

    /// Loader responsible for `definition`.
    pub fn resolve(&self, definition: &DatasetDefinition) -> Result<Arc<dyn DatasetLoader>, LoaderFailure> {
        match &definition.loader {
            Some(prefix) => self
                .prefixed
                .get(prefix)
                .map(|r| r.loader.clone())
                .ok_or_else(|| LoaderFailure::UnknownLoader(prefix.clone())),
            None => self
                .primary
                .as_ref()
                .map(|r| r.loader.clone())
                .ok_or_else(|| LoaderFailure::UnknownLoader("<primary>".to_string())),
        }
    }

    /// Registered prefixes, sorted.
    pub fn prefixes(&self) -> Vec<&str> {
        self.prefixed.keys().map(String::as_str).collect()
    }

    pub fn primary(&self) -> Option<&Arc<dyn DatasetLoader>> {
        self.primary.as_ref().map(|r| &r.loader)
    }

    /// Primary first, then prefixed loaders by prefix.
    pub fn registrations(&self) -> impl Iterator<Item = &LoaderRegistration> {
        self.primary.iter().chain(self.prefixed.values())
    }

    pub fn len(&self) -> usize {
        self.prefixed.len() + usize::from(self.primary.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

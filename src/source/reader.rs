//! Reading raw bytes from local or remote sources.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;

use crate::source::{SourceError, SourceLocation};

/// Anything that can turn a location into raw bytes.
#[async_trait]
pub trait ReadSource: Send + Sync {
    async fn read(&self, location: &SourceLocation) -> Result<Vec<u8>, SourceError>;
}

/// Default reader: `tokio::fs` for local paths, `reqwest` for remote ones.
#[derive(Debug, Clone)]
pub struct SourceReader {
    client: reqwest::Client,
}

impl SourceReader {
    /// Create a reader whose remote fetches fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport {
                location: "<client>".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    async fn read_local(&self, location: &SourceLocation) -> Result<Vec<u8>, SourceError> {
        let Some(path) = location.local_path() else {
            return Err(SourceError::InvalidPath {
                path: location.to_string(),
                message: "not a local path".to_string(),
            });
        };

        tokio::fs::read(path).await.map_err(|e| {
            let shown = path.display().to_string();
            match e.kind() {
                ErrorKind::NotFound => SourceError::NotFound(shown),
                ErrorKind::PermissionDenied => SourceError::PermissionDenied(shown),
                _ => SourceError::Transport {
                    location: shown,
                    message: e.to_string(),
                },
            }
        })
    }

    async fn read_remote(&self, url: &url::Url) -> Result<Vec<u8>, SourceError> {
        let shown = url.to_string();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(&shown, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(shown));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::PermissionDenied(shown));
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                location: shown,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&shown, e))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ReadSource for SourceReader {
    async fn read(&self, location: &SourceLocation) -> Result<Vec<u8>, SourceError> {
        let raw = match location {
            SourceLocation::Local(_) => self.read_local(location).await?,
            SourceLocation::Remote(url) => self.read_remote(url).await?,
        };
        tracing::trace!(location = %location, bytes = raw.len(), "Source read");
        Ok(raw)
    }
}

fn transport_error(location: &str, e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(location.to_string())
    } else {
        SourceError::Transport {
            location: location.to_string(),
            message: e.to_string(),
        }
    }
}

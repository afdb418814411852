//! Source path parsing.

use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::source::SourceError;

/// Where raw content lives, selected by the scheme of the configured path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Local filesystem path (`./a.csv`, `/a.csv`, `file:///a.csv`, `local:///a.csv`).
    Local(PathBuf),
    /// Remote object fetched over HTTP(S).
    Remote(Url),
}

impl SourceLocation {
    /// Parse a configured path.
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SourceError::InvalidPath {
                path: raw.to_string(),
                message: "path is empty".to_string(),
            });
        }

        let Some((scheme, rest)) = raw.split_once("://") else {
            return Ok(Self::Local(PathBuf::from(raw)));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "file" | "local" => {
                if rest.is_empty() {
                    return Err(invalid(raw, "missing file path"));
                }
                Ok(Self::Local(PathBuf::from(rest)))
            }
            "http" | "https" => Url::parse(raw)
                .map(Self::Remote)
                .map_err(|e| invalid(raw, &e.to_string())),
            "s3" => {
                let (bucket, key) = split_bucket(raw, rest)?;
                object_url(raw, &format!("https://{}.s3.amazonaws.com/{}", bucket, key))
            }
            "gs" | "gcs" => {
                let (bucket, key) = split_bucket(raw, rest)?;
                object_url(raw, &format!("https://storage.googleapis.com/{}/{}", bucket, key))
            }
            other => Err(SourceError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The local path, if any.
    pub fn local_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

fn split_bucket<'a>(raw: &str, rest: &'a str) -> Result<(&'a str, &'a str), SourceError> {
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(invalid(raw, "expected <bucket>/<key>")),
    }
}

fn object_url(raw: &str, url: &str) -> Result<SourceLocation, SourceError> {
    Url::parse(url)
        .map(SourceLocation::Remote)
        .map_err(|e| invalid(raw, &e.to_string()))
}

fn invalid(raw: &str, message: &str) -> SourceError {
    SourceError::InvalidPath {
        path: raw.to_string(),
        message: message.to_string(),
    }
}

//! Content fingerprints.
//!
//! Every byte counts: comment and whitespace edits produce a new token.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of raw bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(raw: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

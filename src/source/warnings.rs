//! Suppression of repeated source warnings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Remembers the last failure so identical failures on later polls stay quiet.
#[derive(Debug, Default)]
pub struct WarnLatch {
    last: Mutex<Option<String>>,
    emitted: AtomicUsize,
}

impl WarnLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Returns `true` if it should be logged, i.e. it
    /// differs from the failure currently latched.
    pub fn failure(&self, message: &str) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(message) {
            return false;
        }
        *last = Some(message.to_string());
        self.emitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Clear the latch after a success. Returns `true` if a failure was latched.
    pub fn clear(&self) -> bool {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Number of failures that were reported (not suppressed).
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_failure_is_suppressed() {
        let latch = WarnLatch::new();
        assert!(latch.failure("not found"));
        assert!(!latch.failure("not found"));
        assert!(!latch.failure("not found"));
        assert_eq!(latch.emitted(), 1);
    }

    #[test]
    fn test_changed_or_cleared_failure_is_reported_again() {
        let latch = WarnLatch::new();
        assert!(latch.failure("not found"));
        assert!(latch.failure("timed out"));

        assert!(latch.clear());
        assert!(!latch.clear());
        assert!(latch.failure("timed out"));
        assert_eq!(latch.emitted(), 3);
    }
}

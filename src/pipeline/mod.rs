// Batch translation pipeline
//
// - scheduler: adaptive batch sizing and the whole-batch retry loop
// - recovery: partial-result and per-item fallback handling

pub mod recovery;
pub mod scheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use recovery::*;
pub use scheduler::*;

/// Cooperative cancellation shared between a running job and its owner
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How the cues of one batch were resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResolution {
    /// Cues that received a genuine translation
    pub translated: usize,
    /// Cues that fell back to their source text
    pub fallbacks: usize,
}

impl BatchResolution {
    pub fn merge(self, other: BatchResolution) -> BatchResolution {
        BatchResolution {
            translated: self.translated + other.translated,
            fallbacks: self.fallbacks + other.fallbacks,
        }
    }

    pub fn total(&self) -> usize {
        self.translated + self.fallbacks
    }
}

/// Totals for one translation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub translated: usize,
    pub fallbacks: usize,
    /// Cues left untouched because they were already translated or empty
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_resolution_merge() {
        let a = BatchResolution { translated: 2, fallbacks: 1 };
        let b = BatchResolution { translated: 1, fallbacks: 0 };
        assert_eq!(a.merge(b), BatchResolution { translated: 3, fallbacks: 1 });
        assert_eq!(a.merge(b).total(), 4);
    }
}

//! Shared progress counter for parallel probe runs.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts finished datasets and logs roughly every five percent.
#[derive(Debug)]
pub struct Progress {
    label: &'static str,
    total: usize,
    step: usize,
    done: AtomicUsize,
}

impl Progress {
    pub fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            step: (total / 20).max(1),
            done: AtomicUsize::new(0),
        }
    }

    /// Record one finished item; returns the running count.
    pub fn tick(&self) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.step == 0 || done == self.total {
            tracing::info!(label = self.label, done, total = self.total, "progress");
        }
        done
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

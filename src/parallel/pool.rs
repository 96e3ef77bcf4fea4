//! Rayon thread pool configuration for probe runs.
//!
//! One dataset per task. [WorkerPool::install] runs a closure on a dedicated pool so the
//! configured worker count holds regardless of the global Rayon pool.

use std::thread;

use rayon::ThreadPoolBuilder;

/// Available cores minus one, never less than one.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

/// Configures how many worker threads probe datasets concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    pub workers: usize,
    /// Probe one dataset at a time, for backends that are unsafe to call concurrently.
    pub sequential: bool,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            sequential: false,
        }
    }
}

impl WorkerPool {
    /// Use exactly `n` worker threads (at least one).
    pub fn with_workers(n: usize) -> Self {
        Self {
            workers: n.max(1),
            sequential: false,
        }
    }

    pub fn sequential() -> Self {
        Self {
            workers: 1,
            sequential: true,
        }
    }

    pub fn effective_workers(&self) -> usize {
        if self.sequential {
            1
        } else {
            self.workers.max(1)
        }
    }

    /// Run a closure on a pool with [effective_workers](WorkerPool::effective_workers) threads.
    /// If the pool cannot be built the closure runs on the global Rayon pool.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let workers = self.effective_workers();
        match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("probe-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.install(f),
            Err(err) => {
                tracing::warn!(workers, %err, "unable to build worker pool, using the global pool");
                f()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_pool_uses_one_thread() {
        let pool = WorkerPool::sequential();
        assert_eq!(pool.effective_workers(), 1);
        assert_eq!(pool.install(rayon::current_num_threads), 1);
    }

    #[test]
    fn explicit_worker_count_is_honoured() {
        let pool = WorkerPool::with_workers(3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);
        assert_eq!(WorkerPool::with_workers(0).effective_workers(), 1);
    }

    #[test]
    fn default_leaves_a_core_free() {
        assert!(default_worker_count() >= 1);
        assert_eq!(WorkerPool::default().workers, default_worker_count());
    }
}

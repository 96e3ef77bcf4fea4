pub mod pool;
pub mod progress;

pub use pool::{default_worker_count, WorkerPool};
pub use progress::Progress;

//! Wall-clock bound around a blocking probe.
//!
//! The probe runs on its own thread and the caller waits on a bounded receive. On expiry the
//! thread is abandoned (its result is dropped when it eventually finishes); sibling probes and
//! the calling worker are unaffected.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DeadlineError {
    #[error("deadline of {0:?} exceeded")]
    Expired(Duration),
    #[error("probe worker panicked")]
    Panicked,
    #[error("unable to spawn probe worker: {0}")]
    Spawn(std::io::Error),
}

pub fn run_with_deadline<T, F>(name: &str, limit: Duration, f: F) -> Result<T, DeadlineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(format!("probe-{name}"))
        .spawn(move || {
            // Receiver is gone once the deadline passed.
            let _ = tx.send(f());
        })
        .map_err(DeadlineError::Spawn)?;

    match rx.recv_timeout(limit) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(probe = name, ?limit, "probe deadline exceeded");
            Err(DeadlineError::Expired(limit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(DeadlineError::Panicked),
    }
}

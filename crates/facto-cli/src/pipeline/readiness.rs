//! File readiness gate.
//!
//! Files arriving over a network share are announced before the copy has
//! finished. A file counts as ready once it can be opened for append and
//! renamed onto itself, and its size has stopped changing.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

/// How long to wait for a file and how often to look.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    /// First retry delay; doubles up to four times this value.
    pub retry: Duration,
}

impl ReadinessPolicy {
    pub fn new(timeout: Duration, retry: Duration) -> Self {
        Self { timeout, retry }
    }
}

/// Result of waiting for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Still locked or growing when the timeout ran out.
    NotReady,
    /// Removed before it became ready.
    Vanished,
}

enum Access {
    Unlocked(u64),
    Locked,
    Missing,
}

fn check_access(path: &Path) -> Access {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Access::Missing,
        Err(_) => return Access::Locked,
    };

    if OpenOptions::new().append(true).open(path).is_err() {
        return Access::Locked;
    }
    if fs::rename(path, path).is_err() {
        return Access::Locked;
    }
    Access::Unlocked(size)
}

/// Wait until `path` is complete, retrying with capped backoff.
pub async fn wait_for_file_ready(path: &Path, policy: ReadinessPolicy) -> Readiness {
    let deadline = Instant::now() + policy.timeout;
    let max_delay = policy.retry * 4;
    let mut delay = policy.retry;
    let mut last_size = None;

    loop {
        match check_access(path) {
            Access::Missing => return Readiness::Vanished,
            Access::Unlocked(size) if size > 0 && last_size == Some(size) => return Readiness::Ready,
            Access::Unlocked(size) => {
                trace!("{} unlocked at {} bytes, confirming", path.display(), size);
                last_size = Some(size);
            }
            Access::Locked => {
                trace!("{} is locked", path.display());
                last_size = None;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Readiness::NotReady;
        }
        sleep(delay.min(deadline - now)).await;
        delay = (delay * 2).min(max_delay);
    }
}

//! Duplicate-suppressing FIFO of pending documents.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PathBuf>,
    /// Pending and in-flight paths.
    known: HashSet<PathBuf>,
}

/// Work queue shared by the watcher thread, the rescans and the dispatcher.
///
/// A path stays known from `push` until `complete`, so neither a watcher
/// event nor a rescan can enqueue it again while it is being processed.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a path. Returns false when it is already pending or in flight.
    pub fn push(&self, path: PathBuf) -> bool {
        let mut state = self.lock();
        if !state.known.insert(path.clone()) {
            return false;
        }
        state.pending.push_back(path);
        true
    }

    /// Take the oldest pending path without blocking. It stays in flight
    /// until [`complete`](Self::complete).
    pub fn try_pop(&self) -> Option<PathBuf> {
        self.lock().pending.pop_front()
    }

    /// Forget a path once its worker has finished.
    pub fn complete(&self, path: &Path) {
        self.lock().known.remove(path);
    }

    /// Number of pending paths.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of paths popped but not completed.
    pub fn in_flight(&self) -> usize {
        let state = self.lock();
        state.known.len() - state.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        assert!(queue.push(PathBuf::from("a.pdf")));
        assert!(queue.push(PathBuf::from("b.pdf")));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop(), Some(PathBuf::from("a.pdf")));
        assert_eq!(queue.try_pop(), Some(PathBuf::from("b.pdf")));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_pending_path_is_not_enqueued_twice() {
        let queue = WorkQueue::new();
        assert!(queue.push(PathBuf::from("a.pdf")));
        assert!(!queue.push(PathBuf::from("a.pdf")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_in_flight_path_is_not_enqueued_until_complete() {
        let queue = WorkQueue::new();
        let path = PathBuf::from("a.pdf");
        queue.push(path.clone());

        let taken = queue.try_pop().unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 1);
        assert!(!queue.push(path.clone()), "rescan must skip in-flight work");

        queue.complete(&taken);
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.push(path));
    }

    #[test]
    fn test_concurrent_pushes() {
        let queue = Arc::new(WorkQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(PathBuf::from(format!("{}.pdf", i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 50);
    }
}

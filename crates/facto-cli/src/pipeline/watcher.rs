//! Inbox monitoring.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use facto_core::models::config::WatcherBackend;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::WorkQueue;

/// Whether `path` names a PDF, by extension, case-insensitively.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDF files directly inside `dir`, sorted by name.
pub fn scan_existing(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_pdf(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

enum Backend {
    Poll(PollWatcher),
    Native(RecommendedWatcher),
}

/// Feeds newly created PDFs into the work queue until dropped.
pub struct DirectoryWatcher {
    dir: PathBuf,
    _backend: Backend,
}

impl DirectoryWatcher {
    /// Start watching `dir` (non-recursively).
    ///
    /// The polling backend works on network shares where native
    /// notifications never arrive.
    pub fn start(
        dir: &Path,
        backend: WatcherBackend,
        poll_interval: Duration,
        queue: Arc<WorkQueue>,
    ) -> notify::Result<Self> {
        let handler = move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("Watcher error: {}", e);
                    return;
                }
            };
            // Files copied in show up as creates; files moved in as renames
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) => {}
                _ => return,
            }
            for path in event.paths {
                if is_pdf(&path) && path.is_file() && queue.push(path.clone()) {
                    debug!("Queued {}", path.display());
                }
            }
        };

        let backend = match backend {
            WatcherBackend::Poll => {
                let config = Config::default().with_poll_interval(poll_interval);
                let mut watcher = PollWatcher::new(handler, config)?;
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
                Backend::Poll(watcher)
            }
            WatcherBackend::Native => {
                let mut watcher = RecommendedWatcher::new(handler, Config::default())?;
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
                Backend::Native(watcher)
            }
        };

        info!("Watching {} ({} backend)", dir.display(), backend_name(&backend));
        Ok(Self {
            dir: dir.to_path_buf(),
            _backend: backend,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn backend_name(backend: &Backend) -> &'static str {
    match backend {
        Backend::Poll(_) => "poll",
        Backend::Native(_) => "native",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("a.pdf")));
        assert!(is_pdf(Path::new("/x/B.PDF")));
        assert!(!is_pdf(Path::new("a.pdf.tmp")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn test_scan_existing_skips_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.pdf"), "x").unwrap();
        fs::write(dir.path().join("A.PDF"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub.pdf")).unwrap();

        let files = scan_existing(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("A.PDF"), dir.path().join("b.pdf")]);
    }

    #[test]
    fn test_scan_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        assert!(scan_existing(&dir.path().join("offline")).is_err());
    }

    #[test]
    fn test_poll_watcher_queues_new_pdf() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(WorkQueue::new());
        let watcher = DirectoryWatcher::start(
            dir.path(),
            WatcherBackend::Poll,
            Duration::from_millis(20),
            queue.clone(),
        )
        .unwrap();
        assert_eq!(watcher.dir(), dir.path());

        std::thread::sleep(Duration::from_millis(50));
        fs::write(dir.path().join("new.pdf"), "%PDF").unwrap();
        fs::write(dir.path().join("new.txt"), "x").unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while queue.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(queue.try_pop(), Some(dir.path().join("new.pdf")));
        assert_eq!(queue.try_pop(), None);
    }
}

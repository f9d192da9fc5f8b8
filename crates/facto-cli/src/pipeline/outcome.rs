//! Outcome folders and collision-safe moves.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use facto_core::models::config::WatchConfig;
use serde::Serialize;
use tracing::{debug, warn};

/// Where a processed document ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Posted and delivered (or delivered earlier).
    Sent,
    /// Posted, delivery waiting on partner verification.
    Posted,
    Error,
}

/// The three outcome folders.
#[derive(Debug, Clone)]
pub struct OutcomeFolders {
    pub sent: PathBuf,
    pub posted: PathBuf,
    pub error: PathBuf,
}

impl OutcomeFolders {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            sent: config.sent_dir.clone(),
            posted: config.posted_dir.clone(),
            error: config.error_dir.clone(),
        }
    }

    /// Create any folder that does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [&self.sent, &self.posted, &self.error] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn path(&self, destination: Destination) -> &Path {
        match destination {
            Destination::Sent => &self.sent,
            Destination::Posted => &self.posted,
            Destination::Error => &self.error,
        }
    }
}

/// Split `name.ext` into `("name", ".ext")`.
fn split_name(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => filename.split_at(dot),
        _ => (filename, ""),
    }
}

/// Claim the first free name among `filename`, `base_1.ext`, `base_2.ext`, ...
///
/// The name is reserved by creating an empty file, so two workers finishing
/// at once cannot pick the same target.
fn reserve(folder: &Path, filename: &str) -> io::Result<PathBuf> {
    let (base, ext) = split_name(filename);
    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            folder.join(filename)
        } else {
            folder.join(format!("{}_{}{}", base, counter, ext))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Move `src` into `folder` as `filename`, never overwriting.
///
/// Returns `None` when the source is already gone. A rename that fails
/// (typically across devices) falls back to copy and remove.
pub fn move_to_folder(src: &Path, folder: &Path, filename: &str) -> io::Result<Option<PathBuf>> {
    if !src.exists() {
        debug!("{} already moved", src.display());
        return Ok(None);
    }
    fs::create_dir_all(folder)?;

    let target = reserve(folder, filename)?;
    if fs::rename(src, &target).is_ok() {
        return Ok(Some(target));
    }

    warn!("Rename of {} failed, copying instead", src.display());
    let copied = fs::copy(src, &target).and_then(|_| fs::remove_file(src));
    if let Err(e) = copied {
        // Leave the source in place and drop the placeholder
        let _ = fs::remove_file(&target);
        return Err(e);
    }
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_move_renames_on_collision() {
        let inbox = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        file(out.path(), "inv.pdf", "existing");

        let first = move_to_folder(&file(inbox.path(), "a.pdf", "one"), out.path(), "inv.pdf").unwrap();
        let second = move_to_folder(&file(inbox.path(), "b.pdf", "two"), out.path(), "inv.pdf").unwrap();

        assert_eq!(first, Some(out.path().join("inv_1.pdf")));
        assert_eq!(second, Some(out.path().join("inv_2.pdf")));
        assert_eq!(fs::read_to_string(out.path().join("inv.pdf")).unwrap(), "existing");
        assert_eq!(fs::read_to_string(out.path().join("inv_1.pdf")).unwrap(), "one");
        assert_eq!(fs::read_to_string(out.path().join("inv_2.pdf")).unwrap(), "two");
        assert!(!inbox.path().join("a.pdf").exists());
    }

    #[test]
    fn test_missing_source_is_a_no_op() {
        let out = TempDir::new().unwrap();
        let moved = move_to_folder(&out.path().join("nope.pdf"), out.path(), "x.pdf").unwrap();
        assert_eq!(moved, None);
        assert!(!out.path().join("x.pdf").exists());
    }

    #[test]
    fn test_creates_missing_folder() {
        let root = TempDir::new().unwrap();
        let src = file(root.path(), "a.pdf", "data");
        let folder = root.path().join("sent").join("2025");

        let moved = move_to_folder(&src, &folder, "a.pdf").unwrap().unwrap();
        assert_eq!(moved, folder.join("a.pdf"));
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("inv.pdf"), ("inv", ".pdf"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_ensure_creates_all_folders() {
        let root = TempDir::new().unwrap();
        let folders = OutcomeFolders {
            sent: root.path().join("sent"),
            posted: root.path().join("posted"),
            error: root.path().join("error"),
        };
        folders.ensure().unwrap();
        assert!(folders.path(Destination::Sent).is_dir());
        assert!(folders.path(Destination::Posted).is_dir());
        assert!(folders.path(Destination::Error).is_dir());
    }
}

//! The scratch directory a fetcher is bound to.
//!
//! A `Stage` is created by the invoker before any fetcher operation,
//! handed to the fetcher exactly once via `Fetcher::bind`, and torn down by
//! the invoker afterwards. The fetcher never creates or destroys its own
//! stage (spec §3).

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::errors::{ErrorKind, Res};
use failure::ResultExt;

#[derive(Debug)]
pub struct Stage {
    path: PathBuf,
    save_filename: Option<PathBuf>,
    /// The remembered name of the top-level directory inside a tarball, so
    /// it can be restored when re-archiving. Interior mutability because a
    /// bound fetcher only ever borrows the stage, never owns it (spec §3:
    /// "the fetcher never creates or destroys its stage").
    srcdir: RefCell<Option<String>>,
}

impl Stage {
    /// Creates the stage's root directory and its `source_path` parent.
    pub fn new(path: PathBuf, save_filename: Option<PathBuf>) -> Res<Stage> {
        fs::create_dir_all(&path).context(ErrorKind::NoArchive)?;
        Ok(Stage {
            path,
            save_filename,
            srcdir: RefCell::new(None),
        })
    }

    pub fn srcdir(&self) -> Option<String> {
        self.srcdir.borrow().clone()
    }

    pub fn set_srcdir(&self, name: impl Into<String>) {
        *self.srcdir.borrow_mut() = Some(name.into());
    }

    /// The root of the scratch directory tree.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The canonical unpacked-source directory.
    pub fn source_path(&self) -> PathBuf {
        self.path.join("source")
    }

    /// Target filename under `path()` that a download must land in.
    pub fn save_filename(&self) -> PathBuf {
        self.save_filename
            .clone()
            .unwrap_or_else(|| self.path.join("archive"))
    }

    /// Path to the downloaded artifact, if one has landed.
    pub fn archive_file(&self) -> Option<PathBuf> {
        let candidate = self.save_filename();
        if candidate.is_file() {
            Some(candidate)
        } else {
            None
        }
    }

    /// `true` iff `source_path` exists and is non-empty.
    pub fn expanded(&self) -> bool {
        match fs::read_dir(self.source_path()) {
            Ok(mut entries) => entries.next().is_some(),
            Err(_) => false,
        }
    }

    /// Removes everything under `path()` except the archive file, in
    /// preparation for a fresh `expand()`. Used by archive-backend `reset`.
    pub fn clear_except_archive(&self) -> Res<()> {
        let archive = self.archive_file();
        for entry in fs::read_dir(&self.path).context(ErrorKind::NoArchive)? {
            let entry = entry.context(ErrorKind::NoArchive)?;
            let p = entry.path();
            if Some(&p) == archive.as_ref() {
                continue;
            }
            if p.is_dir() {
                fs::remove_dir_all(&p).context(ErrorKind::NoArchive)?;
            } else {
                fs::remove_file(&p).context(ErrorKind::NoArchive)?;
            }
        }
        Ok(())
    }

    pub fn ensure_source_path(&self) -> Res<()> {
        fs::create_dir_all(self.source_path()).context(ErrorKind::NoArchive)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stage_is_not_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        assert!(!stage.expanded());
        assert!(stage.archive_file().is_none());
    }

    #[test]
    fn expanded_reports_true_once_populated() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        stage.ensure_source_path().unwrap();
        std::fs::write(stage.source_path().join("a.txt"), b"hi").unwrap();
        assert!(stage.expanded());
    }
}

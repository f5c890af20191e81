//! Small, dependency-light utility modules shared by the rest of the crate.

pub mod archive;
pub mod crypto;
pub mod errors;
pub mod lock;
pub mod process;
pub mod url;

use crate::util::errors::{ErrorKind, Res};
use failure::ResultExt;
use std::path::Path;

/// Writes `contents` to `path`, creating parent directories as needed.
/// Carried over from the teacher's `util::write` helper (referenced from
/// `cli/new.rs`).
pub fn write(path: &Path, contents: &[u8]) -> Res<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context(ErrorKind::NoArchive)?;
    }
    std::fs::write(path, contents).context(ErrorKind::NoArchive)?;
    Ok(())
}

/// A discarding logger for tests, built the same way as the teacher's
/// `Cache::from_disk` builds its real one but draining to `slog::Discard`.
#[cfg(test)]
pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

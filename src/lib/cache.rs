//! The content-addressed filesystem mirror cache.
//!
//! Re-architects the teacher's `retrieve::cache::Cache` (a cache keyed by
//! package identity) for a cache keyed by *content*: every stored archive
//! lives at a path derived only from its digest, so two packages that
//! happen to fetch the same bytes share one cache entry (spec §4.3). `store`
//! accepts any already-downloaded archive and its digest; `fetcher` hands
//! back a `CacheUrlFetcher` bound at the cached copy, and `destroy` removes
//! an entry outright. There is no locking beyond `DirLock`'s existence
//! check: the FS cache is last-writer-wins, same as the teacher's.

use std::fs;
use std::path::{Path, PathBuf};

use slog::{info, o, Logger};

use crate::fetch::cache_url::CacheUrlFetcher;
use crate::util::crypto::Digest_;
use crate::util::errors::{ErrorKind, Res};
use crate::util::lock::DirLock;

#[derive(Debug, Clone)]
pub struct MirrorCache {
    root: PathBuf,
    logger: Logger,
}

impl MirrorCache {
    pub fn from_disk(plog: &Logger, root: PathBuf) -> Res<MirrorCache> {
        fs::create_dir_all(&root).map_err(|_| ErrorKind::NoArchive)?;
        let logger = plog.new(o!("cache_root" => root.to_string_lossy().into_owned()));
        Ok(MirrorCache { root, logger })
    }

    /// The path an archive with this digest would live at: two path
    /// components of the hex digest (`ab/cd/abcdef...`) so a large cache
    /// doesn't dump thousands of entries into one directory, then the full
    /// digest as the filename, keeping the original extension so `expand()`
    /// can still sniff the archive kind.
    fn entry_path(&self, digest: &Digest_, file_name: &Path) -> PathBuf {
        let ext = file_name
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .and_then(|n| {
                crate::util::archive::extension(Path::new(&n)).map(|suf| suf.to_string())
            })
            .unwrap_or_default();

        self.root
            .join(digest.algo.name())
            .join(&digest.hex[0..2.min(digest.hex.len())])
            .join(&digest.hex[2.min(digest.hex.len())..4.min(digest.hex.len())])
            .join(format!("{}{}", digest.hex, ext))
    }

    /// Copies `archive` into the cache under its digest, overwriting any
    /// existing entry (last writer wins).
    pub fn store(&self, archive: &Path, digest: &Digest_) -> Res<PathBuf> {
        let dest = self.entry_path(digest, archive);
        DirLock::acquire(dest.parent().ok_or(ErrorKind::NoArchive)?)?;
        fs::copy(archive, &dest).map_err(|_| ErrorKind::NoArchive)?;
        info!(self.logger, "stored archive"; "digest" => &digest.hex, "path" => dest.display().to_string());
        Ok(dest)
    }

    /// `true` if an entry exists for this digest.
    pub fn contains(&self, digest: &Digest_, file_name: &Path) -> bool {
        self.entry_path(digest, file_name).is_file()
    }

    /// Builds a `CacheUrlFetcher` bound at the cached copy, or `NoCache` if
    /// there isn't one (spec §4.3's `fetcher()` operation).
    pub fn fetcher(&self, digest: &Digest_, file_name: &Path) -> Res<CacheUrlFetcher> {
        let path = self.entry_path(digest, file_name);
        if !path.is_file() {
            return Err(ErrorKind::no_cache(&path).into());
        }
        let url = url::Url::from_file_path(&path).map_err(|_| ErrorKind::InvalidSourceUrl)?;
        Ok(CacheUrlFetcher::new(url, Some(digest.clone())))
    }

    /// Removes a cache entry outright.
    pub fn destroy(&self, digest: &Digest_, file_name: &Path) -> Res<()> {
        let path = self.entry_path(digest, file_name);
        if path.is_file() {
            fs::remove_file(&path).map_err(|_| ErrorKind::NoArchive)?;
            info!(self.logger, "destroyed cache entry"; "digest" => &digest.hex);
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::crypto::HashAlgo;

    fn log() -> Logger {
        crate::util::test_logger()
    }

    #[test]
    fn store_then_fetch_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MirrorCache::from_disk(&log(), dir.path().join("cache")).unwrap();

        let archive = dir.path().join("a.tar.gz");
        fs::write(&archive, b"hello").unwrap();
        let digest = Digest_::with_algo(HashAlgo::Sha256, "a".repeat(64));

        assert!(!cache.contains(&digest, &archive));
        cache.store(&archive, &digest).unwrap();
        assert!(cache.contains(&digest, &archive));

        let fetcher = cache.fetcher(&digest, &archive).unwrap();
        assert_eq!(fetcher.source_id(), Some("a".repeat(64)));
    }

    #[test]
    fn fetcher_errors_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MirrorCache::from_disk(&log(), dir.path().join("cache")).unwrap();
        let digest = Digest_::with_algo(HashAlgo::Sha256, "b".repeat(64));
        assert!(cache.fetcher(&digest, Path::new("x.tar.gz")).is_err());
    }

    #[test]
    fn destroy_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MirrorCache::from_disk(&log(), dir.path().join("cache")).unwrap();
        let archive = dir.path().join("a.tar.gz");
        fs::write(&archive, b"hello").unwrap();
        let digest = Digest_::with_algo(HashAlgo::Sha256, "c".repeat(64));
        cache.store(&archive, &digest).unwrap();
        cache.destroy(&digest, &archive).unwrap();
        assert!(!cache.contains(&digest, &archive));
    }
}

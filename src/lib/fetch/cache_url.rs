//! The cache-URL fetcher: symlinks a file already present in the FS mirror
//! cache into the stage, rather than downloading it again.
//!
//! Grounded on `fetch_strategy.py`'s `CacheURLFetchStrategy`: `fetch`
//! requires the source to be a `file://` URL that already exists (raises
//! `NoCacheError` otherwise), and a checksum failure removes the symlink and
//! re-raises so a stale cache entry can't silently poison a build.

use std::cell::Cell;
use std::fs;

use slog::{info, o, Logger};
use url::Url;

use crate::config::Config;
use crate::fetch::transport;
use crate::stage::Stage;
use crate::util::archive;
use crate::util::crypto::{Checker, Digest_};
use crate::util::errors::{ErrorKind, Res};

#[derive(Debug)]
pub struct CacheUrlFetcher {
    pub url: Url,
    pub digest: Option<Digest_>,
    pub(crate) bound: Cell<bool>,
}

impl CacheUrlFetcher {
    pub fn new(url: Url, digest: Option<Digest_>) -> CacheUrlFetcher {
        CacheUrlFetcher {
            url,
            digest,
            bound: Cell::new(false),
        }
    }

    pub fn fetch(&self, stage: &Stage, log: &Logger) -> Res<()> {
        let log = log.new(o!("url" => self.url.as_str().to_string()));

        let cached_path = crate::util::url::local_path(&self.url).ok_or(ErrorKind::InvalidSourceUrl)?;
        if !cached_path.is_file() {
            return Err(ErrorKind::no_cache(&cached_path).into());
        }

        let save_file = stage.save_filename();
        if save_file.exists() {
            fs::remove_file(&save_file).map_err(|_| ErrorKind::NoArchive)?;
        }

        info!(log, "linking cached archive");
        symlink::symlink_file(&cached_path, &save_file).map_err(|_| ErrorKind::NoArchive)?;

        Ok(())
    }

    pub fn check(&self, stage: &Stage, cfg: &dyn Config) -> Res<()> {
        let digest = match &self.digest {
            Some(d) => d,
            None => {
                if cfg.checksum_required() {
                    return Err(ErrorKind::NoDigest.into());
                }
                return Ok(());
            }
        };
        let path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let mut checker = Checker::new(digest.clone());
        if !checker.check(&path)? {
            // A bad cached copy is removed so it isn't served again.
            let _ = fs::remove_file(&path);
            return Err(ErrorKind::Checksum {
                path: path.display().to_string(),
                expected: digest.hex.clone(),
                actual: checker.sum.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }

    pub fn expand(&self, stage: &Stage, log: &Logger) -> Res<()> {
        let archive_path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let kind = archive::detect(&archive_path, None).ok_or(ErrorKind::NoArchive)?;
        stage.ensure_source_path()?;
        info!(log, "expanding cached archive");
        archive::expand_into(&archive_path, &stage.source_path(), kind)
    }

    pub fn reset(&self, stage: &Stage, log: &Logger) -> Res<()> {
        stage.clear_except_archive()?;
        self.expand(stage, log)
    }

    pub fn archive(&self, stage: &Stage, destination: &std::path::Path, cfg: &dyn Config) -> Res<()> {
        let archive_path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let dest_url = crate::util::url::parse(&destination.display().to_string())?;
        transport::push_to_url(&archive_path, &dest_url, cfg.verify_ssl())
    }

    pub fn cachable(&self) -> bool {
        self.digest.is_some()
    }

    pub fn source_id(&self) -> Option<String> {
        self.digest.as_ref().map(|d| d.hex.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_fails_when_cache_entry_missing() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        let missing = dir.path().join("nope.tar.gz");
        let url = Url::from_file_path(&missing).unwrap();
        let f = CacheUrlFetcher::new(url, None);
        let log = crate::util::test_logger();
        assert!(f.fetch(&stage, &log).is_err());
    }

    #[test]
    fn fetch_links_existing_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("cached.tar.gz");
        std::fs::write(&cached, b"data").unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        let url = Url::from_file_path(&cached).unwrap();
        let f = CacheUrlFetcher::new(url, None);
        let log = crate::util::test_logger();
        f.fetch(&stage, &log).unwrap();
        assert!(stage.archive_file().is_some());
    }
}

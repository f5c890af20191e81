//! The URL archive fetcher: downloads a single file over HTTP(S)/FTP/file,
//! verifies its digest, and expands it into the stage's source directory.
//!
//! Grounded on `fetch_strategy.py`'s `URLFetchStrategy` (`fetch`, `check`,
//! `expand`, `reset`, `archive`) — the largest and most-used backend in the
//! original, and the one every other archive-based backend (`CacheURL`,
//! `S3`) borrows its expand/archive logic from.

use std::cell::Cell;
use std::fs;

use slog::{debug, info, o, warn, Logger};
use url::Url;

use crate::config::Config;
use crate::fetch::transport;
use crate::stage::Stage;
use crate::util::archive;
use crate::util::crypto::{Checker, Digest_};
use crate::util::errors::{ErrorKind, Res};

#[derive(Debug)]
pub struct UrlFetcher {
    pub url: Url,
    pub digest: Option<Digest_>,
    pub expand_archive: bool,
    pub extension_override: Option<String>,
    pub(crate) bound: Cell<bool>,
}

impl UrlFetcher {
    pub fn new(url: Url, digest: Option<Digest_>) -> UrlFetcher {
        UrlFetcher {
            url,
            digest,
            expand_archive: true,
            extension_override: None,
            bound: Cell::new(false),
        }
    }

    pub fn fetch(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        let log = log.new(o!("url" => self.url.as_str().to_string()));

        if stage.archive_file().is_some() {
            info!(log, "already downloaded");
            return Ok(());
        }

        let save_file = stage.save_filename();
        let mut partial_name = save_file.clone().into_os_string();
        partial_name.push(".part");
        let partial = std::path::PathBuf::from(partial_name);

        let resume_from = fs::metadata(&partial).ok().map(|m| m.len());
        if resume_from.is_some() {
            debug!(log, "resuming partial download");
        } else {
            info!(log, "fetching");
        }

        let client = transport::client(cfg.verify_ssl())?;
        let ct = transport::download(&client, &self.url, &partial, resume_from)?;

        fs::rename(&partial, &save_file).map_err(|_| ErrorKind::NoArchive)?;

        if let Some(ct) = ct {
            if transport::is_html(&ct) && !self.looks_like_html_target() {
                warn!(log, "content-type mismatch"; "content_type" => ct);
            }
        }

        Ok(())
    }

    /// `true` if the URL itself names an `.html` resource, in which case an
    /// HTML content-type isn't actually suspicious.
    fn looks_like_html_target(&self) -> bool {
        self.url.path().ends_with(".html") || self.url.path().ends_with(".htm")
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
        if !self.expand_archive {
            // Stored but never unpacked: copy the archive straight into
            // source_path under its own basename (fetch_strategy.py's
            // `expand=False` branch).
            stage.ensure_source_path()?;
            let archive_path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
            let name = archive_path
                .file_name()
                .ok_or(ErrorKind::NoArchive)?;
            fs::copy(&archive_path, stage.source_path().join(name)).map_err(|_| ErrorKind::NoArchive)?;
            return Ok(());
        }

        let archive_path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let kind = archive::detect(&archive_path, self.extension_override.as_deref())
            .ok_or(ErrorKind::NoArchive)?;

        // Expand into a private sibling first, never straight into
        // `source_path` (fetch_strategy.py's `expand`: the archive's
        // top-level directory `D`, if there's exactly one, is hoisted so
        // `source_path` becomes `D` itself, not `source_path/D`). Stray
        // hidden entries alongside `D` land in `stage.path()` instead of
        // being silently dropped.
        let scratch = tempfile::tempdir_in(stage.path()).map_err(|_| ErrorKind::NoArchive)?;

        info!(log, "expanding archive"; "kind" => format!("{:?}", kind));
        archive::expand_into(&archive_path, scratch.path(), kind)?;

        let entries: Vec<_> = fs::read_dir(scratch.path())
            .map_err(|_| ErrorKind::NoArchive)?
            .filter_map(|e| e.ok())
            .collect();

        let is_hidden = |e: &fs::DirEntry| e.file_name().to_string_lossy().starts_with('.');
        let (hidden, visible): (Vec<_>, Vec<_>) = entries.into_iter().partition(is_hidden);

        for entry in &hidden {
            let target = stage.path().join(entry.file_name());
            let _ = fs::remove_dir_all(&target);
            let _ = fs::remove_file(&target);
            fs::rename(entry.path(), target).map_err(|_| ErrorKind::NoArchive)?;
        }

        if visible.len() == 1 && visible[0].path().is_dir() {
            // The common case: one top-level directory `D` becomes
            // `source_path` itself.
            if stage.source_path().exists() {
                fs::remove_dir_all(stage.source_path()).map_err(|_| ErrorKind::NoArchive)?;
            }
            fs::rename(visible[0].path(), stage.source_path()).map_err(|_| ErrorKind::NoArchive)?;
            stage.set_srcdir(visible[0].file_name().to_string_lossy().to_string());
        } else {
            // The archive exploded directly at its top level: every visible
            // entry moves into `source_path` unchanged, and there's no
            // single directory name to remember.
            stage.ensure_source_path()?;
            for entry in &visible {
                let target = stage.source_path().join(entry.file_name());
                fs::rename(entry.path(), target).map_err(|_| ErrorKind::NoArchive)?;
            }
        }

        Ok(())
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
    use crate::config::MapConfig;

    #[test]
    fn cachable_requires_digest() {
        let u = UrlFetcher::new(Url::parse("https://example.com/a.tar.gz").unwrap(), None);
        assert!(!u.cachable());
        let u2 = UrlFetcher::new(
            Url::parse("https://example.com/a.tar.gz").unwrap(),
            Digest_::new("0".repeat(64)),
        );
        assert!(u2.cachable());
    }

    #[test]
    fn check_without_digest_honors_checksum_required() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        std::fs::write(stage.save_filename(), b"data").unwrap();

        let u = UrlFetcher::new(Url::parse("https://example.com/a.tar.gz").unwrap(), None);
        let lenient = MapConfig {
            checksum_required: false,
            ..Default::default()
        };
        assert!(u.check(&stage, &lenient).is_ok());

        let strict = MapConfig::default();
        assert!(u.check(&stage, &strict).is_err());
    }

    #[test]
    fn expand_hoists_single_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();

        let src = dir.path().join("src").join("pkg-1.0");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("file.txt"), b"hi").unwrap();

        let file = std::fs::File::create(stage.save_filename()).unwrap();
        let mut builder = tar::Builder::new(file);
        builder.append_dir_all("pkg-1.0", &src).unwrap();
        builder.finish().unwrap();

        let mut f = UrlFetcher::new(Url::parse("https://example.com/pkg-1.0.tar").unwrap(), None);
        f.extension_override = Some(".tar".to_string());
        let log = crate::util::test_logger();
        f.expand(&stage, &log).unwrap();

        assert_eq!(stage.srcdir(), Some("pkg-1.0".to_string()));
        assert!(stage.source_path().join("file.txt").exists());
        assert!(!stage.source_path().join("pkg-1.0").exists());
    }

    #[test]
    fn expand_flattens_archive_with_no_single_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();

        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.txt"), b"a").unwrap();
        std::fs::write(src.join("b.txt"), b"b").unwrap();

        let file = std::fs::File::create(stage.save_filename()).unwrap();
        let mut builder = tar::Builder::new(file);
        builder.append_path_with_name(src.join("a.txt"), "a.txt").unwrap();
        builder.append_path_with_name(src.join("b.txt"), "b.txt").unwrap();
        builder.finish().unwrap();

        let mut f = UrlFetcher::new(Url::parse("https://example.com/flat.tar").unwrap(), None);
        f.extension_override = Some(".tar".to_string());
        let log = crate::util::test_logger();
        f.expand(&stage, &log).unwrap();

        assert!(stage.srcdir().is_none());
        assert!(stage.source_path().join("a.txt").exists());
        assert!(stage.source_path().join("b.txt").exists());
    }
}

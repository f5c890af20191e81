//! The Subversion fetcher: shells out to `svn`, grounded on
//! `fetch_strategy.py`'s `SvnFetchStrategy` (checkout at revision, `svn
//! info --xml` for `source_id`, `svn revert -R` + remove untracked for
//! reset).

use std::cell::Cell;
use std::path::Path;

use slog::{info, o, Logger};

use crate::config::Config;
use crate::stage::Stage;
use crate::util::archive;
use crate::util::errors::{ErrorKind, Res};
use crate::util::process::Tool;

#[derive(Debug)]
pub struct SvnFetcher {
    pub url: String,
    pub revision: Option<String>,
    pub(crate) bound: Cell<bool>,
}

impl SvnFetcher {
    pub fn new(url: impl Into<String>) -> SvnFetcher {
        SvnFetcher {
            url: url.into(),
            revision: None,
            bound: Cell::new(false),
        }
    }

    pub fn fetch(&self, stage: &Stage, _cfg: &dyn Config, log: &Logger) -> Res<()> {
        let log = log.new(o!("url" => self.url.clone()));
        let dest = stage.source_path();

        if dest.join(".svn").exists() {
            info!(log, "already checked out");
            return Ok(());
        }
        std::fs::create_dir_all(stage.path()).map_err(|_| ErrorKind::NoArchive)?;

        info!(log, "checking out");
        let mut args = vec!["checkout"];
        let rev_arg;
        if let Some(rev) = &self.revision {
            rev_arg = format!("-r{}", rev);
            args.push(&rev_arg);
        }
        args.push(&self.url);
        let dest_str = dest.display().to_string();
        args.push(&dest_str);
        Tool::new("svn").run(&args, stage.path(), &log)?;
        Ok(())
    }

    /// Untracked files survive `svn revert`, so they're removed first by
    /// scanning `svn status --no-ignore` for `?`/`I`-flagged entries
    /// (fetch_strategy.py `SvnFetchStrategy.reset`), then the tracked tree
    /// is reverted.
    pub fn reset(&self, stage: &Stage, _cfg: &dyn Config, log: &Logger) -> Res<()> {
        info!(log, "removing untracked files");
        let root = stage.source_path();
        if let Ok(status) = Tool::new("svn").run(&["status", "--no-ignore"], &root, log) {
            for line in status.lines() {
                if let Some(flag) = line.chars().next() {
                    if flag == '?' || flag == 'I' {
                        if let Some(path) = line.get(8..).map(str::trim) {
                            let target = root.join(path);
                            if target.is_dir() {
                                let _ = std::fs::remove_dir_all(&target);
                            } else {
                                let _ = std::fs::remove_file(&target);
                            }
                        }
                    }
                }
            }
        }

        info!(log, "reverting working copy");
        Tool::new("svn").run(&["revert", "-R", "."], &root, log)?;
        Ok(())
    }

    pub fn archive(&self, stage: &Stage, destination: &Path, log: &Logger) -> Res<()> {
        info!(log, "archiving svn checkout");
        let root_name = destination
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        archive::tar_gz_dir(&stage.source_path(), destination, &root_name, &[".svn"])
    }

    /// The pinned revision if given, else `None` — resolving HEAD requires
    /// `svn info --xml` against the checked-out tree, which `fetch` already
    /// leaves in place for the caller to inspect directly.
    pub fn source_id(&self) -> Option<String> {
        self.revision.clone()
    }

    /// Pinned to an exact revision, or a moving target (spec §4.2.3).
    pub fn cachable(&self) -> bool {
        self.revision.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cachable_requires_revision() {
        let mut f = SvnFetcher::new("https://example.com/repo/trunk");
        assert!(!f.cachable());
        f.revision = Some("17".to_string());
        assert!(f.cachable());
    }
}

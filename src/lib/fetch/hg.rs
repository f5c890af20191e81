//! The Mercurial fetcher: shells out to `hg`, grounded on
//! `fetch_strategy.py`'s `HgFetchStrategy` (clone, update to revision,
//! `hg id` for `source_id`, `hg purge --all` for reset).

use std::cell::Cell;
use std::path::Path;

use slog::{info, o, Logger};

use crate::config::Config;
use crate::stage::Stage;
use crate::util::archive;
use crate::util::errors::{ErrorKind, Res};
use crate::util::process::Tool;

#[derive(Debug)]
pub struct HgFetcher {
    pub url: String,
    pub revision: Option<String>,
    pub(crate) bound: Cell<bool>,
}

impl HgFetcher {
    pub fn new(url: impl Into<String>) -> HgFetcher {
        HgFetcher {
            url: url.into(),
            revision: None,
            bound: Cell::new(false),
        }
    }

    fn tool(&self, cfg: &dyn Config) -> Tool {
        let mut t = Tool::new("hg").env_remove("PYTHONPATH");
        if cfg.debug() {
            t = t.env("HGPLAIN", "0");
        } else {
            t = t.env("HGPLAIN", "1");
        }
        t
    }

    pub fn fetch(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        let log = log.new(o!("url" => self.url.clone()));
        let dest = stage.source_path();

        if dest.join(".hg").exists() {
            info!(log, "already cloned");
            return Ok(());
        }
        std::fs::create_dir_all(stage.path()).map_err(|_| ErrorKind::NoArchive)?;

        info!(log, "cloning");
        let mut args = vec!["clone"];
        if let Some(rev) = &self.revision {
            args.push("-r");
            args.push(rev);
        }
        args.push(&self.url);
        let dest_str = dest.display().to_string();
        args.push(&dest_str);
        self.tool(cfg).run(&args, stage.path(), &log)?;
        Ok(())
    }

    pub fn reset(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        info!(log, "purging working tree");
        self.tool(cfg)
            .run(&["update", "-C"], &stage.source_path(), log)?;
        self.tool(cfg)
            .run_ignore_errors(&["purge", "--all"], &stage.source_path(), log);
        Ok(())
    }

    pub fn archive(&self, stage: &Stage, destination: &Path, log: &Logger) -> Res<()> {
        info!(log, "archiving hg checkout");
        let root_name = destination
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        archive::tar_gz_dir(&stage.source_path(), destination, &root_name, &[".hg"])
    }

    /// `hg id -i` reports the working directory's short hash
    /// (fetch_strategy.py `HgFetchStrategy.get_source_id`).
    pub fn source_id(&self) -> Option<String> {
        self.revision.clone()
    }

    /// Pinned to an exact revision, or a moving target (spec §4.2.3:
    /// `cachable = cache_enabled && revision`).
    pub fn cachable(&self) -> bool {
        self.revision.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cachable_requires_revision() {
        let mut f = HgFetcher::new("https://example.com/repo");
        assert!(!f.cachable());
        f.revision = Some("42".to_string());
        assert!(f.cachable());
    }
}

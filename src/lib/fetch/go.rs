//! The Go-module fetcher: `go get` a module path into the stage, grounded on
//! `fetch_strategy.py`'s `GoFetchStrategy`. There is no digest, no partial
//! resume, and no VCS metadata directory to exclude from an archive — `go
//! get` leaves a plain tree behind.

use std::cell::Cell;
use std::path::Path;

use slog::{info, o, Logger};

use crate::config::Config;
use crate::stage::Stage;
use crate::util::archive;
use crate::util::errors::{ErrorKind, Res};
use crate::util::process::Tool;

#[derive(Debug)]
pub struct GoFetcher {
    pub module_path: String,
    pub(crate) bound: Cell<bool>,
}

impl GoFetcher {
    pub fn new(module_path: impl Into<String>) -> GoFetcher {
        GoFetcher {
            module_path: module_path.into(),
            bound: Cell::new(false),
        }
    }

    pub fn fetch(&self, stage: &Stage, _cfg: &dyn Config, log: &Logger) -> Res<()> {
        let log = log.new(o!("module" => self.module_path.clone()));
        let dest = stage.source_path();
        std::fs::create_dir_all(&dest).map_err(|_| ErrorKind::NoArchive)?;

        info!(log, "fetching go module");
        Tool::new("go")
            .env("GOPATH", stage.path().display().to_string())
            .env("GO111MODULE", "on")
            .run(&["get", "-d", &self.module_path], &dest, &log)?;
        Ok(())
    }

    pub fn reset(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        stage.clear_except_archive()?;
        self.fetch(stage, cfg, log)
    }

    pub fn archive(&self, stage: &Stage, destination: &Path, log: &Logger) -> Res<()> {
        info!(log, "archiving go module tree");
        let root_name = destination
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        archive::tar_gz_dir(&stage.source_path(), destination, &root_name, &[])
    }

    /// Not meaningful (spec §4.2.3): `go get` pins nothing a content id could
    /// name, so a composite that includes a Go resource must not be able to
    /// report one either.
    pub fn source_id(&self) -> Option<String> {
        None
    }
}

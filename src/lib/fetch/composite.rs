//! The composite fetcher: one primary backend plus zero or more resource
//! fetchers, each bound to its own sub-stage.
//!
//! Re-architects the Python original's `CompositeFetchStrategy`, built via a
//! metaclass-driven decorator that forwarded every method call to each
//! member in turn (spec §9, "Composite pattern"): here it's a plain struct
//! holding a primary `Fetcher` and a `Vec<(PathBuf, Fetcher)>` of resources,
//! each forwarded to explicitly in registration order.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use slog::{info, Logger};

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::stage::Stage;
use crate::util::errors::Res;

#[derive(Debug)]
pub struct CompositeFetcher {
    pub primary: Box<Fetcher>,
    pub resources: Vec<(PathBuf, Fetcher)>,
    pub(crate) bound: Cell<bool>,
}

impl CompositeFetcher {
    pub fn new(primary: Fetcher, resources: Vec<(PathBuf, Fetcher)>) -> CompositeFetcher {
        CompositeFetcher {
            primary: Box::new(primary),
            resources,
            bound: Cell::new(false),
        }
    }

    /// Binds every member fetcher; called once the composite itself is
    /// bound (see `Fetcher::bind`, which only flips the composite's own
    /// flag — members are driven explicitly here since each needs its own
    /// sub-stage, not the composite's).
    pub fn bind_all(&self) {
        self.primary.bind();
        for (_, r) in &self.resources {
            r.bind();
        }
    }

    pub fn fetch(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.primary.fetch(stage, cfg, log)?;
        for (dest, resource) in &self.resources {
            let sub = Stage::new(stage.path().join(dest), None)?;
            resource.fetch(&sub, cfg, log)?;
        }
        Ok(())
    }

    pub fn check(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.primary.check(stage, cfg, log)?;
        for (dest, resource) in &self.resources {
            let sub = Stage::new(stage.path().join(dest), None)?;
            resource.check(&sub, cfg, log)?;
        }
        Ok(())
    }

    pub fn expand(&self, stage: &Stage, log: &Logger) -> Res<()> {
        self.primary.expand(stage, log)?;
        for (dest, resource) in &self.resources {
            let sub = Stage::new(stage.path().join(dest), None)?;
            resource.expand(&sub, log)?;
        }
        Ok(())
    }

    pub fn reset(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.primary.reset(stage, cfg, log)?;
        for (dest, resource) in &self.resources {
            let sub = Stage::new(stage.path().join(dest), None)?;
            resource.reset(&sub, cfg, log)?;
        }
        Ok(())
    }

    pub fn archive(&self, stage: &Stage, destination: &Path, cfg: &dyn Config, log: &Logger) -> Res<()> {
        info!(log, "archiving primary source only"; "resources" => self.resources.len());
        self.primary.archive(stage, destination, cfg, log)
    }

    /// Cachable only if the primary and every resource is (all-or-nothing,
    /// matching the original's behavior of ANDing member results).
    pub fn cachable(&self) -> bool {
        self.primary.cachable() && self.resources.iter().all(|(_, r)| r.cachable())
    }

    /// `None` if any member can't name a source id, since a partial
    /// identifier would silently under-specify the fetched content.
    pub fn source_id(&self) -> Option<String> {
        let mut parts = vec![self.primary.source_id()?];
        for (_, r) in &self.resources {
            parts.push(r.source_id()?);
        }
        Some(parts.join("+"))
    }
}

//! The no-code fetcher.
//!
//! Required so post-fetch hooks have something to call for packages with
//! `has_code == false`; every operation is a no-op success (spec §4.1
//! rule 1).

use std::cell::Cell;

use slog::Logger;

use crate::util::errors::Res;

#[derive(Debug, Default)]
pub struct BundleFetcher {
    pub(crate) bound: Cell<bool>,
}

impl BundleFetcher {
    pub fn new() -> BundleFetcher {
        BundleFetcher::default()
    }

    pub fn fetch(&self, log: &Logger) -> Res<()> {
        slog::info!(log, "no code to fetch");
        Ok(())
    }

    pub fn check(&self, log: &Logger) -> Res<()> {
        slog::info!(log, "no code to check");
        Ok(())
    }

    pub fn expand(&self, log: &Logger) -> Res<()> {
        slog::info!(log, "no archive to expand");
        Ok(())
    }

    pub fn reset(&self, log: &Logger) -> Res<()> {
        slog::info!(log, "no code to reset");
        Ok(())
    }

    pub fn archive(&self, _destination: &std::path::Path, log: &Logger) -> Res<()> {
        slog::info!(log, "no code to archive");
        Ok(())
    }

    pub fn cachable(&self) -> bool {
        false
    }

    pub fn source_id(&self) -> Option<String> {
        Some(String::new())
    }
}

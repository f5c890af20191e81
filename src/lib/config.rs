//! The configuration surface the core reads from.
//!
//! The real key/value scope stack (`config.get("mirrors")`, etc.) lives
//! outside this crate, per spec §1. `Config` is the narrow trait the core
//! reads through; `MapConfig` is an in-memory test double modeled after the
//! teacher's preference for small, explicit structs over global state
//! (spec §9, "Global mutable state" re-architecture).

use crate::mirror::MirrorSet;
use std::path::PathBuf;

pub trait Config {
    /// `config:verify_ssl` — toggles certificate verification on all SSL
    /// transports.
    fn verify_ssl(&self) -> bool;

    /// `config:checksum` — when false, missing checksums are tolerated.
    fn checksum_required(&self) -> bool;

    /// `config:debug` — toggles verbose VCS invocation.
    fn debug(&self) -> bool;

    /// `config:source_cache` — root of the FS cache.
    fn source_cache(&self) -> PathBuf;

    /// The ordered mirror collection, read through from configuration.
    fn mirrors(&self) -> MirrorSet;
}

/// An in-memory `Config` for tests and small tools, carrying no persistence
/// of its own.
#[derive(Clone, Debug)]
pub struct MapConfig {
    pub verify_ssl: bool,
    pub checksum_required: bool,
    pub debug: bool,
    pub source_cache: PathBuf,
    pub mirrors: MirrorSet,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            verify_ssl: true,
            checksum_required: true,
            debug: false,
            source_cache: default_source_cache(),
            mirrors: MirrorSet::new(),
        }
    }
}

/// The platform cache directory (`~/.cache/srcfetch/sources` on Linux, the
/// analogous location elsewhere), falling back to a relative directory if
/// the platform has no defined cache location at all.
fn default_source_cache() -> PathBuf {
    directories::ProjectDirs::from("", "", "srcfetch")
        .map(|dirs| dirs.cache_dir().join("sources"))
        .unwrap_or_else(|| PathBuf::from(".source-cache"))
}

impl Config for MapConfig {
    fn verify_ssl(&self) -> bool {
        self.verify_ssl
    }

    fn checksum_required(&self) -> bool {
        self.checksum_required
    }

    fn debug(&self) -> bool {
        self.debug
    }

    fn source_cache(&self) -> PathBuf {
        self.source_cache.clone()
    }

    fn mirrors(&self) -> MirrorSet {
        self.mirrors.clone()
    }
}

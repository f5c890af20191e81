//! The fetcher abstraction: one tagged enum standing in for the Python
//! original's class hierarchy (spec §9, "Polymorphism").
//!
//! Every backend implements the same seven-operation table
//! (`fetch`/`check`/`expand`/`reset`/`archive`/`cachable`/`source_id`), so
//! rather than a trait object we use a closed `enum Fetcher` and dispatch
//! with a `match` — the set of backends is fixed at compile time (spec
//! §4.1's registry), so there's no need to pay for dynamic dispatch or open
//! the set to downstream implementors.

pub mod bundle;
pub mod cache_url;
pub mod composite;
pub mod git;
pub mod go;
pub mod hg;
pub mod registry;
pub mod s3;
pub mod select;
pub mod svn;
pub mod transport;
pub mod url;

use std::cell::Cell;
use std::path::Path;

use slog::Logger;

use crate::config::Config;
use crate::stage::Stage;
use crate::util::errors::{ErrorKind, Res};

pub use bundle::BundleFetcher;
pub use cache_url::CacheUrlFetcher;
pub use composite::CompositeFetcher;
pub use git::GitFetcher;
pub use go::GoFetcher;
pub use hg::HgFetcher;
pub use s3::S3Fetcher;
pub use svn::SvnFetcher;
pub use url::UrlFetcher;

/// A backend, bound or unbound to a particular `Stage`.
///
/// `bind`/`unbind` replace the Python original's decorator-guarded
/// precondition (spec §9): every operation checks `self.bound` first and
/// returns `ErrorKind::NoStage` if the caller skipped `bind`. The `Stage`
/// itself is never owned by the fetcher — every operation still takes
/// `&Stage` explicitly — `bound` only tracks whether the invoker has
/// completed the handshake.
#[derive(Debug)]
pub enum Fetcher {
    Bundle(BundleFetcher),
    Url(UrlFetcher),
    CacheUrl(CacheUrlFetcher),
    Git(GitFetcher),
    Hg(HgFetcher),
    Svn(SvnFetcher),
    Go(GoFetcher),
    S3(S3Fetcher),
    Composite(CompositeFetcher),
}

/// Name used in `NoStage` error messages and log lines, one per variant.
impl Fetcher {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Fetcher::Bundle(_) => "bundle",
            Fetcher::Url(_) => "url",
            Fetcher::CacheUrl(_) => "cache_url",
            Fetcher::Git(_) => "git",
            Fetcher::Hg(_) => "hg",
            Fetcher::Svn(_) => "svn",
            Fetcher::Go(_) => "go",
            Fetcher::S3(_) => "s3",
            Fetcher::Composite(_) => "composite",
        }
    }

    pub fn bind(&self) {
        self.bound_flag().set(true);
        if let Fetcher::Composite(f) = self {
            f.bind_all();
        }
    }

    pub fn unbind(&self) {
        self.bound_flag().set(false);
    }

    fn bound_flag(&self) -> &Cell<bool> {
        match self {
            Fetcher::Bundle(f) => &f.bound,
            Fetcher::Url(f) => &f.bound,
            Fetcher::CacheUrl(f) => &f.bound,
            Fetcher::Git(f) => &f.bound,
            Fetcher::Hg(f) => &f.bound,
            Fetcher::Svn(f) => &f.bound,
            Fetcher::Go(f) => &f.bound,
            Fetcher::S3(f) => &f.bound,
            Fetcher::Composite(f) => &f.bound,
        }
    }

    fn require_bound(&self, op: &'static str) -> Res<()> {
        if self.bound_flag().get() {
            Ok(())
        } else {
            Err(ErrorKind::NoStage { op }.into())
        }
    }

    pub fn fetch(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.require_bound("fetch")?;
        match self {
            Fetcher::Bundle(f) => f.fetch(log),
            Fetcher::Url(f) => f.fetch(stage, cfg, log),
            Fetcher::CacheUrl(f) => f.fetch(stage, log),
            Fetcher::Git(f) => f.fetch(stage, cfg, log),
            Fetcher::Hg(f) => f.fetch(stage, cfg, log),
            Fetcher::Svn(f) => f.fetch(stage, cfg, log),
            Fetcher::Go(f) => f.fetch(stage, cfg, log),
            Fetcher::S3(f) => f.fetch(stage, cfg, log),
            Fetcher::Composite(f) => f.fetch(stage, cfg, log),
        }
    }

    pub fn check(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.require_bound("check")?;
        match self {
            Fetcher::Bundle(f) => f.check(log),
            Fetcher::Url(f) => f.check(stage, cfg),
            Fetcher::CacheUrl(f) => f.check(stage, cfg),
            Fetcher::Git(_) | Fetcher::Hg(_) | Fetcher::Svn(_) | Fetcher::Go(_) => {
                // VCS backends have no content digest to check against
                // (spec §4.2.3); verifying a clone means re-resolving its
                // source_id, which `fetch`/`reset` already do.
                Ok(())
            }
            Fetcher::S3(f) => f.check(stage, cfg),
            Fetcher::Composite(f) => f.check(stage, cfg, log),
        }
    }

    pub fn expand(&self, stage: &Stage, log: &Logger) -> Res<()> {
        self.require_bound("expand")?;
        match self {
            Fetcher::Bundle(f) => f.expand(log),
            Fetcher::Url(f) => f.expand(stage, log),
            Fetcher::CacheUrl(f) => f.expand(stage, log),
            Fetcher::Git(_) | Fetcher::Hg(_) | Fetcher::Svn(_) | Fetcher::Go(_) => Ok(()),
            Fetcher::S3(f) => f.expand(stage, log),
            Fetcher::Composite(f) => f.expand(stage, log),
        }
    }

    pub fn reset(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.require_bound("reset")?;
        match self {
            Fetcher::Bundle(f) => f.reset(log),
            Fetcher::Url(f) => f.reset(stage, log),
            Fetcher::CacheUrl(f) => f.reset(stage, log),
            Fetcher::Git(f) => f.reset(stage, cfg, log),
            Fetcher::Hg(f) => f.reset(stage, cfg, log),
            Fetcher::Svn(f) => f.reset(stage, cfg, log),
            Fetcher::Go(f) => f.reset(stage, cfg, log),
            Fetcher::S3(f) => f.reset(stage, log),
            Fetcher::Composite(f) => f.reset(stage, cfg, log),
        }
    }

    pub fn archive(&self, stage: &Stage, destination: &Path, cfg: &dyn Config, log: &Logger) -> Res<()> {
        self.require_bound("archive")?;
        match self {
            Fetcher::Bundle(f) => f.archive(destination, log),
            Fetcher::Url(f) => f.archive(stage, destination, cfg),
            Fetcher::CacheUrl(f) => f.archive(stage, destination, cfg),
            Fetcher::Git(f) => f.archive(stage, destination, log),
            Fetcher::Hg(f) => f.archive(stage, destination, log),
            Fetcher::Svn(f) => f.archive(stage, destination, log),
            Fetcher::Go(f) => f.archive(stage, destination, log),
            Fetcher::S3(f) => f.archive(stage, destination, cfg),
            Fetcher::Composite(f) => f.archive(stage, destination, cfg, log),
        }
    }

    /// Whether a fetch's result may be stored in the mirror cache (spec
    /// §4.3): only digest-verifiable, non-VCS downloads qualify.
    pub fn cachable(&self) -> bool {
        match self {
            Fetcher::Bundle(f) => f.cachable(),
            Fetcher::Url(f) => f.cachable(),
            Fetcher::CacheUrl(f) => f.cachable(),
            // commit/tag-pinned git and revision-pinned hg/svn name a fixed
            // source_id (spec §4.2.3); a bare branch or go module does not.
            Fetcher::Git(f) => f.cachable(),
            Fetcher::Hg(f) => f.cachable(),
            Fetcher::Svn(f) => f.cachable(),
            Fetcher::Go(_) => false,
            Fetcher::S3(f) => f.cachable(),
            Fetcher::Composite(f) => f.cachable(),
        }
    }

    /// A stable identifier for the exact content fetched (a digest, a VCS
    /// revision), or `None` if the backend can't name one (spec §4.1).
    pub fn source_id(&self) -> Option<String> {
        match self {
            Fetcher::Bundle(f) => f.source_id(),
            Fetcher::Url(f) => f.source_id(),
            Fetcher::CacheUrl(f) => f.source_id(),
            Fetcher::Git(f) => f.source_id(),
            Fetcher::Hg(f) => f.source_id(),
            Fetcher::Svn(f) => f.source_id(),
            Fetcher::Go(f) => f.source_id(),
            Fetcher::S3(f) => f.source_id(),
            Fetcher::Composite(f) => f.source_id(),
        }
    }

    /// Names the place this fetcher's content actually came from, for a
    /// `PackageId` to carry alongside the package name. A `Composite`
    /// resolves to its primary's place — the resources it pulled in
    /// alongside don't change where the package itself was fetched from.
    pub fn resolution(&self) -> crate::package::Resolution {
        use crate::package::Resolution;
        match self {
            Fetcher::Bundle(_) => Resolution::Bundle,
            Fetcher::Url(f) => Resolution::Url {
                url: f.url.as_str().to_string(),
                digest: f.digest.as_ref().map(|d| d.hex.clone()),
            },
            Fetcher::CacheUrl(f) => Resolution::Url {
                url: f.url.as_str().to_string(),
                digest: f.digest.as_ref().map(|d| d.hex.clone()),
            },
            Fetcher::Git(f) => Resolution::Git {
                url: f.url.clone(),
                spec: f.source_id(),
            },
            Fetcher::Hg(f) => Resolution::Hg {
                url: f.url.clone(),
                revision: f.source_id(),
            },
            Fetcher::Svn(f) => Resolution::Svn {
                url: f.url.clone(),
                revision: f.source_id(),
            },
            Fetcher::Go(f) => Resolution::Go {
                path: f.module_path.clone(),
            },
            Fetcher::S3(f) => Resolution::S3 {
                url: f.url.as_str().to_string(),
                digest: f.digest.as_ref().map(|d| d.hex.clone()),
            },
            Fetcher::Composite(f) => f.primary.resolution(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_fetcher_rejects_operations() {
        let f = Fetcher::Bundle(BundleFetcher::new());
        let log = crate::util::test_logger();
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        let err = f.fetch(&stage, &crate::config::MapConfig::default(), &log).unwrap_err();
        assert!(err.to_string().contains("bind"));
    }

    #[test]
    fn bind_then_fetch_succeeds() {
        let f = Fetcher::Bundle(BundleFetcher::new());
        f.bind();
        let log = crate::util::test_logger();
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(dir.path().join("stage"), None).unwrap();
        f.fetch(&stage, &crate::config::MapConfig::default(), &log).unwrap();
    }
}

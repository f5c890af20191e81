//! The narrow interface the core consumes "a package" through.
//!
//! Everything else about a package — its manifest format, its dependency
//! graph, how it's stored — is out of scope (spec §1). The core only ever
//! asks a `Package` for its name, its declared versions' attribute bags, an
//! extrapolated URL, and whether it has code at all.

use crate::package::{AttributeBag, Name, Resource, Version};
use crate::util::errors::Res;
use indexmap::IndexMap;
use url::Url;

pub trait Package {
    fn name(&self) -> &Name;

    /// The package's top-level attributes, e.g. `url` or `git` set outside
    /// any particular `version()`.
    fn top_level_attr(&self, key: &str) -> Option<&str>;

    /// All top-level attribute keys present (used to detect multiple VCS
    /// tags at the package level).
    fn top_level_keys(&self) -> Vec<&str>;

    fn versions(&self) -> &IndexMap<Version, AttributeBag>;

    fn resources(&self, version: &Version) -> &[Resource];

    /// Whether this package has code to fetch at all. `false` routes
    /// selection to the bundle fetcher unconditionally.
    fn has_code(&self) -> bool;

    fn list_url(&self) -> Option<&Url>;

    /// Templates a URL for a version not present in `versions()`.
    fn url_for_version(&self, version: &Version) -> Res<Url>;
}

/// A minimal, owned `Package` implementation for tests and small tools.
#[derive(Clone, Debug, Default)]
pub struct SimplePackage {
    pub name: Name,
    pub top_level: IndexMap<String, String>,
    pub versions: IndexMap<Version, AttributeBag>,
    pub resources: IndexMap<Version, Vec<Resource>>,
    pub has_code: bool,
    pub list_url: Option<Url>,
    pub url_template: Option<String>,
}

impl Default for Name {
    fn default() -> Name {
        Name::new("unnamed")
    }
}

impl SimplePackage {
    pub fn new(name: impl Into<String>) -> SimplePackage {
        SimplePackage {
            name: Name::new(name),
            has_code: true,
            ..Default::default()
        }
    }
}

impl Package for SimplePackage {
    fn name(&self) -> &Name {
        &self.name
    }

    fn top_level_attr(&self, key: &str) -> Option<&str> {
        self.top_level.get(key).map(|s| s.as_str())
    }

    fn top_level_keys(&self) -> Vec<&str> {
        self.top_level.keys().map(|s| s.as_str()).collect()
    }

    fn versions(&self) -> &IndexMap<Version, AttributeBag> {
        &self.versions
    }

    fn resources(&self, version: &Version) -> &[Resource] {
        self.resources
            .get(version)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn has_code(&self) -> bool {
        self.has_code
    }

    fn list_url(&self) -> Option<&Url> {
        self.list_url.as_ref()
    }

    fn url_for_version(&self, version: &Version) -> Res<Url> {
        use crate::util::errors::ErrorKind;
        let template = self.url_template.as_ref().ok_or_else(|| {
            ErrorKind::ExtrapolationError(format!("{} defines no URL pattern", self.name))
        })?;
        let rendered = template.replace("{version}", version.as_str());
        Url::parse(&rendered)
            .map_err(|_| ErrorKind::ExtrapolationError(format!("bad template result: {}", rendered)).into())
    }
}

//! Types describing a package version's declarative attributes.
//!
//! `Name`, `Version`, and the attribute bag are the vocabulary the
//! selection algorithm (`crate::fetch::select`) walks to pick a backend;
//! none of it knows how to build or resolve a dependency graph — that's the
//! package repository's job, consumed only through `crate::package_trait::Package`.

pub mod attrs;
pub mod resolution;
pub mod version;

use std::fmt;
use std::str::FromStr;

use crate::util::errors::{ErrorKind, Res};

pub use self::attrs::{AttrValue, AttributeBag};
pub use self::resolution::Resolution;
pub use self::version::Version;

/// A package's lowercase name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    pub fn new(s: impl Into<String>) -> Name {
        Name(s.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Name {
    type Err = failure::Error;

    fn from_str(s: &str) -> Res<Name> {
        if s.is_empty() {
            return Err(ErrorKind::InvalidPackageId.into());
        }
        Ok(Name::new(s))
    }
}

/// A resource is an additional artifact staged alongside a package's
/// primary source (e.g. a sub-component fetched from its own URL or repo).
/// It carries its own attribute bag, exactly like a version's top-level
/// args, so the same selection algorithm can bind a fetcher to it.
#[derive(Clone, Debug, Default)]
pub struct Resource {
    pub name: String,
    pub destination: std::path::PathBuf,
    pub attrs: AttributeBag,
}

/// Identifies a fetched source uniquely enough to key the FS cache and to
/// salt a build's content hash: the package name plus the resolution that
/// was used to fetch it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageId {
    name: Name,
    resolution: Resolution,
}

impl PackageId {
    pub fn new(name: Name, resolution: Resolution) -> PackageId {
        PackageId { name, resolution }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased() {
        assert_eq!(Name::new("Foo-Bar").as_str(), "foo-bar");
    }

    #[test]
    fn rejects_empty_name() {
        assert!(Name::from_str("").is_err());
    }
}

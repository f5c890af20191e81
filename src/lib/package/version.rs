//! A package version token.
//!
//! Per spec §3: "A dotted/hyphenated alphanumeric token with a total order
//! defined elsewhere; for this core, equality and hashing suffice." Real
//! ordering (semver precedence, etc.) belongs to the external resolver this
//! core never talks to; we still derive `Ord` so versions can be used as
//! `BTreeMap` keys in tests and tools, but nothing in this crate relies on
//! that order being semantically meaningful.

use std::fmt;
use std::str::FromStr;

use crate::util::errors::{ErrorKind, Res};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(String);

impl Version {
    pub fn new(s: impl Into<String>) -> Version {
        Version(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = failure::Error;

    fn from_str(s: &str) -> Res<Version> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
            return Err(ErrorKind::InvalidPackageId.into());
        }
        Ok(Version::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_hyphenated_token() {
        assert!(Version::from_str("1.2.3-rc1").is_ok());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(Version::from_str("1.2/3").is_err());
    }
}

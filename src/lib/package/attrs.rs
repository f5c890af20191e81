//! The attribute bag: a version's (or resource's) recognised keyword
//! arguments, e.g. `{url: "...", sha256: "..."}` or `{git: "...", tag:
//! "v1.0"}`.

use indexmap::IndexMap;
use std::fmt;

/// A single attribute value. Kept as a small closed enum — the set of
/// shapes every backend's `optional_attrs` can take — rather than a fully
/// generic `toml::Value`-style tree, since the core never needs to round
/// trip arbitrary recipe data (that's the package repository's concern).
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::List(v) => write!(f, "{}", v.join(",")),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> AttrValue {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> AttrValue {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> AttrValue {
        AttrValue::Bool(b)
    }
}

/// An ordered map of attribute name to value. Order doesn't matter for
/// fetcher construction, but `IndexMap` is what the teacher reaches for
/// anywhere stable iteration might matter to a caller inspecting the bag.
pub type AttributeBag = IndexMap<String, AttrValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrvalue_accessors() {
        assert_eq!(AttrValue::from("x").as_str(), Some("x"));
        assert_eq!(AttrValue::from(true).as_bool(), Some(true));
        assert_eq!(AttrValue::Str("y".into()).as_bool(), None);
    }
}

//! The ordered mirror collection: `{name -> {fetch_url, push_url}}`, with
//! insertion order preserved so the spider and fallback-fetch walk mirrors
//! in the order the user added them.
//!
//! Grounded on `cmd/mirror.py`'s `mirror_add`/`mirror_remove`/
//! `mirror_set_url`: additions go to the front of the list (most recently
//! added mirror is tried first), and `set_url`'s oddity — it reports
//! `changes_made` from comparing the *new* fetch/push pair, not from
//! whether anything about the named entry actually changed — is preserved
//! faithfully (documented open question, resolved to keep the original's
//! observable behavior).

use failure::ResultExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::util::errors::{ErrorKind, Res};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorEntry {
    pub fetch: String,
    pub push: String,
}

impl MirrorEntry {
    pub fn single(url: impl Into<String>) -> MirrorEntry {
        let url = url.into();
        MirrorEntry {
            push: url.clone(),
            fetch: url,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorSet {
    /// `IndexMap` so the iteration order matches insertion order; `add`
    /// re-inserts at the front by rebuilding the map (spec: "most recently
    /// added mirror is consulted first").
    entries: IndexMap<String, MirrorEntry>,
}

impl MirrorSet {
    pub fn new() -> MirrorSet {
        MirrorSet::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MirrorEntry> {
        self.entries.get(name)
    }

    /// Mirrors in insertion order, most-recently-added first. `add`
    /// rebuilds the map with the new entry first each time, so the map's
    /// own iteration order already is that order — no reversal needed.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MirrorEntry)> {
        self.entries.iter()
    }

    /// Adds a mirror at the front of the collection. Fails if the name is
    /// already present (cmd/mirror.py's `mirror_add` raises rather than
    /// silently overwriting).
    pub fn add(&mut self, name: impl Into<String>, entry: MirrorEntry) -> Res<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(ErrorKind::InvalidMirrorConfig.into());
        }
        let mut rebuilt = IndexMap::with_capacity(self.entries.len() + 1);
        rebuilt.insert(name, entry);
        rebuilt.extend(std::mem::take(&mut self.entries));
        self.entries = rebuilt;
        Ok(())
    }

    /// Removes a mirror by name, returning `true` if it was present
    /// (cmd/mirror.py's `mirror_remove`).
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.shift_remove(name).is_some()
    }

    /// Sets the fetch and/or push URL of an existing mirror. Returns
    /// `changes_made`: whether the *resulting* fetch/push pair differs from
    /// each other, computed the same (slightly surprising) way the Python
    /// original does it, rather than from whether anything changed relative
    /// to the previous entry.
    pub fn set_url(&mut self, name: &str, fetch: Option<String>, push: Option<String>) -> Res<bool> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or(ErrorKind::InvalidMirrorConfig)?;

        if let Some(f) = fetch {
            entry.fetch = f;
        }
        if let Some(p) = push {
            entry.push = p;
        }

        Ok(entry.fetch != entry.push)
    }

    /// Renders an entry back to its serialized form: a bare string when
    /// fetch and push coincide, a `{fetch, push}` table otherwise
    /// (cmd/mirror.py's collapsing behavior when writing `mirrors.yaml`).
    pub fn to_serializable(&self, name: &str) -> Option<MirrorSerialized> {
        let entry = self.entries.get(name)?;
        Some(if entry.fetch == entry.push {
            MirrorSerialized::Bare(entry.fetch.clone())
        } else {
            MirrorSerialized::Split {
                fetch: entry.fetch.clone(),
                push: entry.push.clone(),
            }
        })
    }

    /// The whole collection as a `{name -> fetch/push}` JSON object, in
    /// insertion order, for a config layer to persist.
    pub fn to_json(&self) -> Res<String> {
        let ordered: IndexMap<&String, MirrorSerialized> = self
            .entries
            .keys()
            .map(|name| (name, self.to_serializable(name).expect("name came from entries")))
            .collect();
        serde_json::to_string_pretty(&ordered)
            .context(ErrorKind::InvalidMirrorConfig)
            .map_err(Into::into)
    }

    /// Parses a `{name -> fetch/push}` JSON object back into a collection,
    /// preserving the document's key order.
    pub fn from_json(data: &str) -> Res<MirrorSet> {
        let parsed: IndexMap<String, MirrorSerialized> =
            serde_json::from_str(data).context(ErrorKind::InvalidMirrorConfig)?;
        let mut set = MirrorSet::new();
        for (name, entry) in parsed {
            let entry = match entry {
                MirrorSerialized::Bare(u) => MirrorEntry::single(u),
                MirrorSerialized::Split { fetch, push } => MirrorEntry { fetch, push },
            };
            set.add(name, entry)?;
        }
        Ok(set)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MirrorSerialized {
    Bare(String),
    Split { fetch: String, push: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_inserts_at_front() {
        let mut m = MirrorSet::new();
        m.add("first", MirrorEntry::single("https://a")).unwrap();
        m.add("second", MirrorEntry::single("https://b")).unwrap();
        let names: Vec<_> = m.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn add_rejects_duplicate_name() {
        let mut m = MirrorSet::new();
        m.add("x", MirrorEntry::single("https://a")).unwrap();
        assert!(m.add("x", MirrorEntry::single("https://b")).is_err());
    }

    #[test]
    fn remove_reports_presence() {
        let mut m = MirrorSet::new();
        m.add("x", MirrorEntry::single("https://a")).unwrap();
        assert!(m.remove("x"));
        assert!(!m.remove("x"));
    }

    #[test]
    fn set_url_reports_changes_made_from_resulting_pair() {
        let mut m = MirrorSet::new();
        m.add("x", MirrorEntry::single("https://a")).unwrap();
        // Setting fetch to the same URL the entry already has still reports
        // `true` for changes_made, because push still differs — matching
        // the original's comparison of the resulting pair, not a diff
        // against the previous entry.
        let changed = m.set_url("x", Some("https://a".to_string()), Some("https://push".to_string())).unwrap();
        assert!(changed);
    }

    #[test]
    fn bare_serialization_when_fetch_equals_push() {
        let mut m = MirrorSet::new();
        m.add("x", MirrorEntry::single("https://a")).unwrap();
        match m.to_serializable("x").unwrap() {
            MirrorSerialized::Bare(u) => assert_eq!(u, "https://a"),
            _ => panic!("expected bare form"),
        }
    }
}

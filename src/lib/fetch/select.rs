//! `for_package_version`: picks and constructs the `Fetcher` for one
//! package version, the single entry point every other module reaches the
//! registry through.
//!
//! Grounded on `fetch_strategy.py`'s `for_package_version` and its helpers
//! `_check_version_attributes`/`from_url_scheme`/`from_list_url`.

use std::collections::HashSet;

use itertools::Itertools;
use url::Url;

use crate::config::Config;
use crate::fetch::registry::{self, REGISTRY};
use crate::fetch::{
    BundleFetcher, CacheUrlFetcher, CompositeFetcher, Fetcher, GitFetcher, GoFetcher, HgFetcher, S3Fetcher,
    SvnFetcher, UrlFetcher,
};
use crate::package::{AttrValue, AttributeBag, Version};
use crate::package_trait::Package;
use crate::util::crypto::{Digest_, HashAlgo};
use crate::util::errors::{ErrorKind, Res};
use crate::util::url::Scheme;

/// Picks the backend for `version`, short-circuiting to the bundle fetcher
/// for a package declared as having no code at all (fetch_strategy.py
/// `for_package_version`, step 1).
pub fn for_package_version(pkg: &dyn Package, version: &Version, cfg: &dyn Config) -> Res<Fetcher> {
    if !pkg.has_code() {
        return Ok(Fetcher::Bundle(BundleFetcher::new()));
    }

    validate_package_attrs(pkg)?;

    let primary = match pkg.versions().get(version) {
        Some(attrs) => from_attrs(pkg, attrs)?,
        None => from_extrapolated_url(pkg, version)?,
    };

    let resources = pkg.resources(version);
    if resources.is_empty() {
        return Ok(primary);
    }

    let mut built = Vec::with_capacity(resources.len());
    for r in resources {
        built.push((r.destination.clone(), from_attrs(pkg, &r.attrs)?));
    }
    Ok(Fetcher::Composite(CompositeFetcher::new(primary, built)))
}

/// Spec §4.1 step 2: the set of top-level `url_attr`s present on the
/// package, minus `url`, must have cardinality <= 1 — declaring both
/// `git = "..."` and `hg = "..."` at the package level is a configuration
/// error regardless of what any individual version says.
fn validate_package_attrs(pkg: &dyn Package) -> Res<()> {
    let top_level: HashSet<&str> = pkg.top_level_keys().into_iter().collect();
    let vcs_tags: Vec<&str> = REGISTRY
        .iter()
        .map(|b| b.url_attr)
        .filter(|attr| *attr != "url" && top_level.contains(attr))
        .collect();
    if vcs_tags.len() > 1 {
        return Err(ErrorKind::FetcherConflict(vcs_tags.into_iter().sorted().join(", ")).into());
    }
    Ok(())
}

/// Builds a fetcher from one explicit attribute bag — a version's own
/// attrs, or a resource's — by walking the registry in order and applying
/// the three sub-rules of spec §4.1 step 4 in priority order. The walk
/// order (URL before VCS) is the documented tie-break for rule (b)/(c); a
/// version-level attribute in rule (a) always wins outright, since it
/// names the backend unambiguously regardless of what the package
/// declares at the top level.
fn from_attrs(pkg: &dyn Package, attrs: &AttributeBag) -> Res<Fetcher> {
    let top_level: HashSet<&str> = pkg.top_level_keys().into_iter().collect();

    // (a) a backend's url_attr named directly in this version's/resource's
    // own attrs takes precedence over anything declared at package level.
    if let Some(backend) = REGISTRY.iter().find(|b| attrs.contains_key(b.url_attr)) {
        validate_recognised(backend, attrs)?;
        return build(backend.url_attr, attrs);
    }

    // (b) a backend whose url_attr is present at the package level (or is
    // "url") is eligible if the version mentions any of its optional_attrs.
    if let Some(backend) = REGISTRY
        .iter()
        .find(|b| (top_level.contains(b.url_attr) || b.url_attr == "url") && b.optional_attrs.iter().any(|oa| attrs.contains_key(*oa)))
    {
        let merged = merge_top_level(pkg, backend.url_attr, attrs);
        validate_recognised(backend, &merged)?;
        return build(backend.url_attr, &merged);
    }

    // (c) otherwise, the first backend whose url_attr is present at the
    // package level at all.
    if let Some(backend) = REGISTRY.iter().find(|b| top_level.contains(b.url_attr)) {
        let merged = merge_top_level(pkg, backend.url_attr, attrs);
        return build(backend.url_attr, &merged);
    }

    // Step 5: no branch matched.
    Err(ErrorKind::InvalidArgs("no fetch strategy matched this version's attributes".to_string()).into())
}

/// Merges `{url_attr: pkg.<url_attr>}` into a copy of `attrs`, per spec
/// §4.1 step 4(b)/4(c) ("construct it by merging").
fn merge_top_level(pkg: &dyn Package, url_attr: &str, attrs: &AttributeBag) -> AttributeBag {
    let mut merged = attrs.clone();
    if !merged.contains_key(url_attr) {
        if let Some(v) = pkg.top_level_attr(url_attr) {
            merged.insert(url_attr.to_string(), AttrValue::from(v));
        }
    }
    merged
}

/// Spec §3: "A version's attribute bag may only name keys drawn from the
/// chosen backend's recognised set `{url_attr} ∪ optional_attrs ∪
/// {"no_cache"}`" — any other key is invalid, whether it's a plain typo or
/// (the more common, "ambiguous-argument" case of spec §4.1) an attribute
/// some *other* backend recognises but this one doesn't.
fn validate_recognised(backend: &registry::BackendDescriptor, attrs: &AttributeBag) -> Res<()> {
    for key in attrs.keys() {
        let key = key.as_str();
        let recognised = key == backend.url_attr || key == "no_cache" || backend.optional_attrs.contains(&key);
        if recognised {
            continue;
        }
        return Err(ErrorKind::InvalidArgs(format!(
            "'{}' is not a recognised attribute for the {} fetcher",
            key, backend.url_attr
        ))
        .into());
    }
    Ok(())
}

fn attr_str<'a>(attrs: &'a AttributeBag, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(AttrValue::as_str)
}

fn attr_bool(attrs: &AttributeBag, key: &str) -> bool {
    attrs.get(key).and_then(AttrValue::as_bool).unwrap_or(false)
}

fn digest_from_attrs(attrs: &AttributeBag) -> Option<Digest_> {
    if let Some(hex) = attr_str(attrs, "checksum") {
        return Digest_::new(hex.to_string());
    }
    for name in HashAlgo::all_names() {
        if let Some(hex) = attr_str(attrs, name) {
            if let Ok(algo) = parse_algo(name) {
                return Some(Digest_::with_algo(algo, hex.to_string()));
            }
        }
    }
    None
}

fn parse_algo(name: &str) -> Res<HashAlgo> {
    Ok(match name {
        "md5" => HashAlgo::Md5,
        "sha1" => HashAlgo::Sha1,
        "sha224" => HashAlgo::Sha224,
        "sha256" => HashAlgo::Sha256,
        "sha384" => HashAlgo::Sha384,
        "sha512" => HashAlgo::Sha512,
        _ => return Err(ErrorKind::InvalidArgs(format!("unknown digest name {}", name)).into()),
    })
}

fn build(url_attr: &str, attrs: &AttributeBag) -> Res<Fetcher> {
    match url_attr {
        "url" => {
            let url = crate::util::url::parse(attr_str(attrs, "url").unwrap_or_default())?;
            let mut f = UrlFetcher::new(url, digest_from_attrs(attrs));
            if let Some(false) = attrs.get("expand").and_then(AttrValue::as_bool) {
                f.expand_archive = false;
            }
            if let Some(ext) = attr_str(attrs, "extension") {
                f.extension_override = Some(ext.to_string());
            }
            Ok(Fetcher::Url(f))
        }
        "git" => {
            let mut f = GitFetcher::new(attr_str(attrs, "git").unwrap_or_default());
            f.tag = attr_str(attrs, "tag").map(str::to_string);
            f.branch = attr_str(attrs, "branch").map(str::to_string);
            f.commit = attr_str(attrs, "commit").map(str::to_string);
            f.submodules = attr_bool(attrs, "submodules");
            f.get_full_repo = attr_bool(attrs, "get_full_repo");
            Ok(Fetcher::Git(f))
        }
        "hg" => {
            let mut f = HgFetcher::new(attr_str(attrs, "hg").unwrap_or_default());
            f.revision = attr_str(attrs, "revision").map(str::to_string);
            Ok(Fetcher::Hg(f))
        }
        "svn" => {
            let mut f = SvnFetcher::new(attr_str(attrs, "svn").unwrap_or_default());
            f.revision = attr_str(attrs, "revision").map(str::to_string);
            Ok(Fetcher::Svn(f))
        }
        "go" => Ok(Fetcher::Go(GoFetcher::new(attr_str(attrs, "go").unwrap_or_default()))),
        "s3" => {
            let url = crate::util::url::parse(attr_str(attrs, "s3").unwrap_or_default())?;
            Ok(Fetcher::S3(S3Fetcher::new(url, digest_from_attrs(attrs))))
        }
        other => Err(ErrorKind::InvalidArgs(format!("unknown backend attribute {}", other)).into()),
    }
}

/// A version with no declared attrs falls back to the package's URL
/// template (fetch_strategy.py's extrapolation branch). No digest is
/// available in this path.
fn from_extrapolated_url(pkg: &dyn Package, version: &Version) -> Res<Fetcher> {
    let url = pkg.url_for_version(version)?;
    Ok(Fetcher::Url(UrlFetcher::new(url, None)))
}

/// Builds a URL fetcher straight from a `list_url`-discovered version map,
/// preferring a checksum already on file for this exact version
/// (fetch_strategy.py `from_list_url`).
pub fn from_list_url(url: Url, known_checksum: Option<String>) -> Fetcher {
    let digest = known_checksum.and_then(Digest_::new);
    Fetcher::Url(UrlFetcher::new(url, digest))
}

/// Dispatches purely by URL scheme rather than by declared attribute name —
/// used when a caller has a bare URL and no package attrs at all. Kept
/// distinct from `from_attrs`'s attribute-driven lookup per the documented
/// divergence between the two code paths in the original.
pub fn from_url_scheme(url: &Url) -> Fetcher {
    match crate::util::url::classify(url) {
        Scheme::File => Fetcher::CacheUrl(CacheUrlFetcher::new(url.clone(), None)),
        Scheme::S3 => Fetcher::S3(S3Fetcher::new(url.clone(), None)),
        Scheme::Git => Fetcher::Git(GitFetcher::new(url.as_str())),
        _ => Fetcher::Url(UrlFetcher::new(url.clone(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::package_trait::SimplePackage;
    use indexmap::IndexMap;

    #[test]
    fn bundle_short_circuits_when_no_code() {
        let mut pkg = SimplePackage::new("foo");
        pkg.has_code = false;
        let cfg = MapConfig::default();
        let f = for_package_version(&pkg, &Version::new("1.0"), &cfg).unwrap();
        assert!(matches!(f, Fetcher::Bundle(_)));
    }

    #[test]
    fn conflicting_vcs_attrs_are_rejected() {
        let mut pkg = SimplePackage::new("foo");
        let mut attrs: AttributeBag = IndexMap::new();
        attrs.insert("git".to_string(), AttrValue::from("https://example.com/r.git"));
        attrs.insert("hg".to_string(), AttrValue::from("https://example.com/r"));
        pkg.versions.insert(Version::new("1.0"), attrs);
        let cfg = MapConfig::default();
        assert!(for_package_version(&pkg, &Version::new("1.0"), &cfg).is_err());
    }

    #[test]
    fn url_backend_picks_up_checksum() {
        let mut pkg = SimplePackage::new("foo");
        let mut attrs: AttributeBag = IndexMap::new();
        attrs.insert("url".to_string(), AttrValue::from("https://example.com/a.tar.gz"));
        attrs.insert("sha256".to_string(), AttrValue::from("0".repeat(64)));
        pkg.versions.insert(Version::new("1.0"), attrs);
        let cfg = MapConfig::default();
        let f = for_package_version(&pkg, &Version::new("1.0"), &cfg).unwrap();
        assert_eq!(f.source_id(), Some("0".repeat(64)));
    }

    #[test]
    fn unrecognised_attribute_is_rejected() {
        let mut pkg = SimplePackage::new("foo");
        let mut attrs: AttributeBag = IndexMap::new();
        attrs.insert("url".to_string(), AttrValue::from("https://example.com/a.tar.gz"));
        attrs.insert("bogus_attr".to_string(), AttrValue::from("x"));
        pkg.versions.insert(Version::new("1.0"), attrs);
        let cfg = MapConfig::default();
        assert!(for_package_version(&pkg, &Version::new("1.0"), &cfg).is_err());
    }

    #[test]
    fn top_level_url_and_vcs_tie_break_to_url() {
        // Spec §4.1: a package may declare both a top-level `url` and a
        // top-level VCS url (that alone isn't a package-attribute
        // conflict, since the cardinality check excludes `url`); when a
        // version supplies nothing discriminating, registry walk order
        // (URL before VCS) picks the winner rather than erroring.
        let mut pkg = SimplePackage::new("foo");
        pkg.top_level.insert("url".to_string(), "https://example.com/foo-1.0.tar.gz".to_string());
        pkg.top_level.insert("git".to_string(), "https://example.com/foo.git".to_string());
        pkg.versions.insert(Version::new("1.0"), IndexMap::new());
        let cfg = MapConfig::default();
        let f = for_package_version(&pkg, &Version::new("1.0"), &cfg).unwrap();
        assert!(matches!(f, Fetcher::Url(_)));
    }

    #[test]
    fn version_level_attr_wins_over_top_level_vcs() {
        // Rule 4(a): a backend named directly in the version's own attrs
        // wins outright, even if the package also declares an unrelated
        // VCS tag at the top level.
        let mut pkg = SimplePackage::new("foo");
        pkg.top_level.insert("git".to_string(), "https://example.com/foo.git".to_string());
        let mut attrs: AttributeBag = IndexMap::new();
        attrs.insert("url".to_string(), AttrValue::from("https://example.com/foo-1.0.tar.gz"));
        pkg.versions.insert(Version::new("1.0"), attrs);
        let cfg = MapConfig::default();
        let f = for_package_version(&pkg, &Version::new("1.0"), &cfg).unwrap();
        assert!(matches!(f, Fetcher::Url(_)));
    }

    #[test]
    fn missing_version_falls_back_to_extrapolation() {
        let mut pkg = SimplePackage::new("foo");
        pkg.url_template = Some("https://example.com/foo-{version}.tar.gz".to_string());
        let cfg = MapConfig::default();
        let f = for_package_version(&pkg, &Version::new("9.9"), &cfg).unwrap();
        assert!(matches!(f, Fetcher::Url(_)));
    }
}

//! The fetcher registry: an explicit, fixed-order list of backend
//! descriptors.
//!
//! Spec §4.1/§9: the Python original seeds this list from class-definition
//! order via a metaclass; we re-architect that as a plain `const` array
//! built once, so the walk order (URL archive backends precede VCS
//! backends) is documented and doesn't depend on link order or file
//! discovery.

/// Identifies one backend: the attribute name that selects it, and the
/// extra per-version attributes it recognises.
#[derive(Copy, Clone, Debug)]
pub struct BackendDescriptor {
    pub url_attr: &'static str,
    pub optional_attrs: &'static [&'static str],
}

pub const URL_ATTRS: &[&str] = &[
    "md5", "sha1", "sha224", "sha256", "sha384", "sha512", "checksum",
    "expand", "curl_options", "extension",
];

pub const GIT_ATTRS: &[&str] = &["tag", "branch", "commit", "submodules", "get_full_repo"];
pub const HG_ATTRS: &[&str] = &["revision"];
pub const SVN_ATTRS: &[&str] = &["revision"];
pub const GO_ATTRS: &[&str] = &[];
pub const S3_ATTRS: &[&str] = URL_ATTRS;

/// Construction order is the documented selection tie-break (spec §4.1):
/// URL archive backends precede VCS backends.
pub const REGISTRY: &[BackendDescriptor] = &[
    BackendDescriptor {
        url_attr: "url",
        optional_attrs: URL_ATTRS,
    },
    BackendDescriptor {
        url_attr: "git",
        optional_attrs: GIT_ATTRS,
    },
    BackendDescriptor {
        url_attr: "hg",
        optional_attrs: HG_ATTRS,
    },
    BackendDescriptor {
        url_attr: "svn",
        optional_attrs: SVN_ATTRS,
    },
    BackendDescriptor {
        url_attr: "go",
        optional_attrs: GO_ATTRS,
    },
    BackendDescriptor {
        url_attr: "s3",
        optional_attrs: S3_ATTRS,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_precedes_vcs_backends() {
        let idx_url = REGISTRY.iter().position(|b| b.url_attr == "url").unwrap();
        let idx_git = REGISTRY.iter().position(|b| b.url_attr == "git").unwrap();
        assert!(idx_url < idx_git);
    }
}

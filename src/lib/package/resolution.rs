//! `Resolution` names the place a package version was actually fetched
//! from — the durable half of a `PackageId`. It's derived from a bound
//! fetcher (see `crate::fetch::Fetcher::resolution`) rather than built by
//! hand, the way the teacher's `Resolution` enum is built from a `DepReq`.

use std::fmt;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    Url { url: String, digest: Option<String> },
    Git { url: String, spec: Option<String> },
    Hg { url: String, revision: Option<String> },
    Svn { url: String, revision: Option<String> },
    Go { path: String },
    S3 { url: String, digest: Option<String> },
    Bundle,
}

impl Resolution {
    pub fn url(url: &Url, digest: Option<String>) -> Resolution {
        Resolution::Url {
            url: url.as_str().to_string(),
            digest,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Url { url, .. } => write!(f, "url+{}", url),
            Resolution::Git { url, spec: Some(s) } => write!(f, "git+{}#{}", url, s),
            Resolution::Git { url, spec: None } => write!(f, "git+{}", url),
            Resolution::Hg { url, revision: Some(r) } => write!(f, "hg+{}#{}", url, r),
            Resolution::Hg { url, revision: None } => write!(f, "hg+{}", url),
            Resolution::Svn { url, revision: Some(r) } => write!(f, "svn+{}#{}", url, r),
            Resolution::Svn { url, revision: None } => write!(f, "svn+{}", url),
            Resolution::Go { path } => write!(f, "go+{}", path),
            Resolution::S3 { url, .. } => write!(f, "s3+{}", url),
            Resolution::Bundle => write!(f, "bundle"),
        }
    }
}

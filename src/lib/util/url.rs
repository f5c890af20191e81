//! URL parsing, normalization, joining, and scheme classification.

use crate::util::errors::{ErrorKind, Res};
use failure::ResultExt;
use std::path::{Path, PathBuf};
use url::Url;

/// The transport family a URL belongs to, used to pick a backend and to
/// decide transport-level behaviour (e.g. shallow-clone eligibility).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    Ftp,
    File,
    S3,
    Ssh,
    Git,
    Other,
}

pub fn classify(url: &Url) -> Scheme {
    match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        "ftp" => Scheme::Ftp,
        "file" => Scheme::File,
        "s3" => Scheme::S3,
        "ssh" => Scheme::Ssh,
        "git" => Scheme::Git,
        _ => Scheme::Other,
    }
}

/// Parses a URL, defaulting a bare local path to the `file` scheme, the way
/// spack's `url_util.parse` does.
pub fn parse(s: &str) -> Res<Url> {
    match Url::parse(s) {
        Ok(u) => Ok(u),
        Err(_) => {
            let path = Path::new(s);
            let abs = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .context(ErrorKind::InvalidSourceUrl)?
                    .join(path)
            };
            Url::from_file_path(&abs).map_err(|_| ErrorKind::InvalidSourceUrl.into())
        }
    }
}

/// Joins a (possibly relative) href against a base URL.
pub fn join(base: &Url, href: &str) -> Res<Url> {
    base.join(href).context(ErrorKind::InvalidSourceUrl).map_err(Into::into)
}

/// The basename a URL fetcher would use to save its archive under, e.g.
/// `https://example.com/dist/foo-1.0.tar.gz` -> `foo-1.0.tar.gz`.
pub fn basename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segs| segs.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Extracts the local filesystem path from a `file://` URL, used by the
/// cache-URL fetcher.
pub fn local_path(url: &Url) -> Option<PathBuf> {
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

/// Renders a URL back to its canonical string form.
pub fn format(url: &Url) -> String {
    url.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_schemes() {
        assert_eq!(classify(&Url::parse("https://x/y").unwrap()), Scheme::Https);
        assert_eq!(classify(&Url::parse("s3://bucket/key").unwrap()), Scheme::S3);
        assert_eq!(classify(&Url::parse("file:///tmp/a").unwrap()), Scheme::File);
    }

    #[test]
    fn basename_strips_to_last_segment() {
        let u = Url::parse("https://example.com/dist/foo-1.0.tar.gz").unwrap();
        assert_eq!(basename(&u), "foo-1.0.tar.gz");
    }

    #[test]
    fn basename_falls_back_on_trailing_slash() {
        let u = Url::parse("https://example.com/dist/").unwrap();
        assert_eq!(basename(&u), "download");
    }

    #[test]
    fn joins_relative_href() {
        let base = Url::parse("https://example.com/dir/index.html").unwrap();
        let joined = join(&base, "../other.tar.gz").unwrap();
        assert_eq!(joined.as_str(), "https://example.com/other.tar.gz");
    }
}

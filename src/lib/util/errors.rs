//! The error taxonomy surfaced by the fetch core.
//!
//! Every fallible operation in this crate returns `Res<T>`, a thin alias
//! over `failure::Error`. Call sites attach an `ErrorKind` with
//! `.context(ErrorKind::Foo)` the way the rest of the crate does, so that
//! callers can match on `err.downcast_ref::<ErrorKind>()` or just print the
//! `Display` chain.

use std::path::PathBuf;

pub type Res<T> = Result<T, failure::Error>;
pub type Error = failure::Error;

/// The taxonomy from the spec: observable by name, not by number.
#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "failed to fetch {}: {}", url, detail)]
    FailedDownload { url: String, detail: DownloadDetail },

    #[fail(display = "checksum mismatch for {}: expected {} but got {}", path, expected, actual)]
    Checksum {
        path: String,
        expected: String,
        actual: String,
    },

    #[fail(display = "no digest available to check")]
    NoDigest,

    #[fail(display = "must bind a stage before calling {}", op)]
    NoStage { op: &'static str },

    #[fail(display = "no archive file present in stage")]
    NoArchive,

    #[fail(display = "no cached copy at {}", path)]
    NoCache { path: String },

    #[fail(display = "package cannot specify multiple VCS attributes: {}", _0)]
    FetcherConflict(String),

    #[fail(display = "could not determine a fetch strategy: {}", _0)]
    InvalidArgs(String),

    #[fail(display = "could not extrapolate a URL for this version: {}", _0)]
    ExtrapolationError(String),

    #[fail(display = "no network connection: {}", _0)]
    NoNetworkConnection(String),

    #[fail(display = "invalid package identifier")]
    InvalidPackageId,

    #[fail(display = "invalid source url")]
    InvalidSourceUrl,

    #[fail(display = "invalid mirror configuration")]
    InvalidMirrorConfig,
}

#[derive(Debug)]
pub enum DownloadDetail {
    NotFound,
    InvalidCertificate,
    Other(String),
}

impl std::fmt::Display for DownloadDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadDetail::NotFound => write!(f, "404 not found"),
            DownloadDetail::InvalidCertificate => write!(
                f,
                "TLS certificate verification failed (retry with verify_ssl=false at your own risk)"
            ),
            DownloadDetail::Other(s) => write!(f, "{}", s),
        }
    }
}

impl ErrorKind {
    pub fn failed_download(url: impl Into<String>, detail: DownloadDetail) -> Self {
        ErrorKind::FailedDownload {
            url: url.into(),
            detail,
        }
    }

    pub fn no_cache(path: &PathBuf) -> Self {
        ErrorKind::NoCache {
            path: path.display().to_string(),
        }
    }
}

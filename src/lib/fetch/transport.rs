//! Shared HTTP plumbing used by the URL, cache-URL, S3 backends, and the
//! spider: a blocking client (spec §5 — the fetch lifecycle is synchronous),
//! content-type sniffing, and a `push_to_url` used by every backend's
//! `archive()`.

use std::fs;
use std::io::copy;
use std::path::Path;
use std::time::Duration;

use failure::ResultExt;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use url::Url;

use crate::util::errors::{DownloadDetail, ErrorKind, Res};
use crate::util::url::{local_path, Scheme};

/// Per-request timeout (spec §5: "fixed per-request timeout (10s default)").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn client(verify_ssl: bool) -> Res<Client> {
    Client::builder()
        .danger_accept_invalid_certs(!verify_ssl)
        .timeout(DEFAULT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context(ErrorKind::failed_download("<client>", DownloadDetail::Other("failed to build HTTP client".into())))
        .map_err(Into::into)
}

/// Maps a transport-level failure to the spec's `FailedDownload` taxonomy.
pub fn classify_send_error(url: &str, err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        return ErrorKind::failed_download(url, DownloadDetail::Other("timed out".into()));
    }
    let msg = err.to_string();
    if msg.contains("certificate") || msg.contains("SSL") || msg.contains("TLS") {
        ErrorKind::failed_download(url, DownloadDetail::InvalidCertificate)
    } else {
        ErrorKind::failed_download(url, DownloadDetail::Other(msg))
    }
}

pub fn classify_status(url: &str, status: StatusCode) -> Option<ErrorKind> {
    if status == StatusCode::NOT_FOUND {
        Some(ErrorKind::failed_download(url, DownloadDetail::NotFound))
    } else if status.as_u16() >= 400 {
        Some(ErrorKind::failed_download(
            url,
            DownloadDetail::Other(format!("HTTP {}", status)),
        ))
    } else {
        None
    }
}

/// Retains only the rule "use the last Content-Type occurrence" across a
/// redirect chain: reqwest already resolves redirects internally, so the
/// final response's header is the relevant one by construction.
pub fn content_type(resp: &Response) -> Option<String> {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Downloads `url` into `dest`, returning the content-type header if any.
/// Supports HTTP range resume when `resume_from` is `Some(offset)`.
pub fn download(
    client: &Client,
    url: &Url,
    dest: &Path,
    resume_from: Option<u64>,
) -> Res<Option<String>> {
    let mut req = client.get(url.clone());
    if let Some(offset) = resume_from {
        req = req.header(reqwest::header::RANGE, format!("bytes={}-", offset));
    }

    let resp = req
        .send()
        .map_err(|e| classify_send_error(url.as_str(), &e))?;

    if let Some(kind) = classify_status(url.as_str(), resp.status()) {
        return Err(kind.into());
    }

    let ct = content_type(&resp);

    let mut out = if resume_from.is_some() {
        fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(dest)
    } else {
        fs::File::create(dest)
    }
    .context(ErrorKind::NoArchive)?;

    let mut resp = resp;
    copy(&mut resp, &mut out).context(ErrorKind::NoArchive)?;

    Ok(ct)
}

/// Pushes a local file to `destination`, which may be a `file://`, `http(s)`
/// URL (via PUT), or anything else a caller plugs a `Pusher` in for (S3).
pub fn push_to_url(local: &Path, destination: &Url, verify_ssl: bool) -> Res<()> {
    match crate::util::url::classify(destination) {
        Scheme::File => {
            let dest_path = local_path(destination)
                .ok_or_else(|| ErrorKind::InvalidSourceUrl)?;
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).context(ErrorKind::NoArchive)?;
            }
            fs::copy(local, &dest_path).context(ErrorKind::NoArchive)?;
            Ok(())
        }
        Scheme::Http | Scheme::Https => {
            let body = fs::read(local).context(ErrorKind::NoArchive)?;
            let c = client(verify_ssl)?;
            let resp = c
                .put(destination.clone())
                .body(body)
                .send()
                .map_err(|e| classify_send_error(destination.as_str(), &e))?;
            if let Some(kind) = classify_status(destination.as_str(), resp.status()) {
                return Err(kind.into());
            }
            Ok(())
        }
        other => Err(ErrorKind::failed_download(
            destination.as_str(),
            DownloadDetail::Other(format!("unsupported push scheme: {:?}", other)),
        )
        .into()),
    }
}

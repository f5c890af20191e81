//! The S3 fetcher.
//!
//! Credential management and request signing are explicitly out of scope
//! (spec §1's Non-goal on "cloud storage credential handling"), so rather
//! than depend on an AWS SDK this backend is generic over a `Signer`: given
//! an `s3://bucket/key` URL it asks the signer for a plain HTTPS URL to GET
//! or PUT, then reuses the same transport plumbing as the URL backend.
//! Grounded on `fetch_strategy.py`'s `S3FetchStrategy`, which does the
//! analogous thing against `boto3`.

use std::cell::Cell;
use std::path::Path;

use slog::{info, o, Logger};
use url::Url;

use crate::config::Config;
use crate::fetch::transport;
use crate::stage::Stage;
use crate::util::archive::{self};
use crate::util::crypto::{Checker, Digest_};
use crate::util::errors::{ErrorKind, Res};

/// Turns an `s3://` reference into a directly-fetchable URL. The real
/// implementation lives outside this crate (it needs AWS credentials);
/// `S3Fetcher` only specifies the seam.
pub trait Signer: std::fmt::Debug {
    fn sign_get(&self, url: &Url) -> Res<Url>;
    fn sign_put(&self, url: &Url) -> Res<Url>;
}

/// A signer that assumes the bucket is public and the `s3://` URL can be
/// rewritten to `https://<endpoint>/<bucket>/<key>` unmodified. Used when no
/// real signer is wired in; honors `S3_ENDPOINT_URL` like the original reads
/// it from the environment for S3-compatible stores (MinIO, etc.).
#[derive(Debug, Default)]
pub struct PublicBucketSigner;

impl PublicBucketSigner {
    fn rewrite(&self, url: &Url) -> Res<Url> {
        let endpoint = std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "https://s3.amazonaws.com".to_string());
        let bucket = url.host_str().ok_or(ErrorKind::InvalidSourceUrl)?;
        let key = url.path().trim_start_matches('/');
        Url::parse(&format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key))
            .map_err(|_| ErrorKind::InvalidSourceUrl.into())
    }
}

impl Signer for PublicBucketSigner {
    fn sign_get(&self, url: &Url) -> Res<Url> {
        self.rewrite(url)
    }

    fn sign_put(&self, url: &Url) -> Res<Url> {
        self.rewrite(url)
    }
}

#[derive(Debug)]
pub struct S3Fetcher {
    pub url: Url,
    pub digest: Option<Digest_>,
    pub signer: Box<dyn Signer>,
    pub(crate) bound: Cell<bool>,
}

impl S3Fetcher {
    pub fn new(url: Url, digest: Option<Digest_>) -> S3Fetcher {
        S3Fetcher {
            url,
            digest,
            signer: Box::new(PublicBucketSigner),
            bound: Cell::new(false),
        }
    }

    pub fn with_signer(url: Url, digest: Option<Digest_>, signer: Box<dyn Signer>) -> S3Fetcher {
        S3Fetcher {
            url,
            digest,
            signer,
            bound: Cell::new(false),
        }
    }

    pub fn fetch(&self, stage: &Stage, cfg: &dyn Config, log: &Logger) -> Res<()> {
        let log = log.new(o!("url" => self.url.as_str().to_string()));

        if stage.archive_file().is_some() {
            info!(log, "already downloaded");
            return Ok(());
        }

        let signed = self.signer.sign_get(&self.url)?;
        info!(log, "fetching from s3");
        let client = transport::client(cfg.verify_ssl())?;
        transport::download(&client, &signed, &stage.save_filename(), None)?;
        Ok(())
    }

    pub fn check(&self, stage: &Stage, cfg: &dyn Config) -> Res<()> {
        let digest = match &self.digest {
            Some(d) => d,
            None => {
                if cfg.checksum_required() {
                    return Err(ErrorKind::NoDigest.into());
                }
                return Ok(());
            }
        };
        let path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let mut checker = Checker::new(digest.clone());
        if !checker.check(&path)? {
            return Err(ErrorKind::Checksum {
                path: path.display().to_string(),
                expected: digest.hex.clone(),
                actual: checker.sum.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }

    pub fn expand(&self, stage: &Stage, log: &Logger) -> Res<()> {
        let archive_path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let kind = archive::detect(&archive_path, None).ok_or(ErrorKind::NoArchive)?;
        stage.ensure_source_path()?;
        info!(log, "expanding archive");
        archive::expand_into(&archive_path, &stage.source_path(), kind)
    }

    pub fn reset(&self, stage: &Stage, log: &Logger) -> Res<()> {
        stage.clear_except_archive()?;
        self.expand(stage, log)
    }

    pub fn archive(&self, stage: &Stage, destination: &Path, cfg: &dyn Config) -> Res<()> {
        let archive_path = stage.archive_file().ok_or(ErrorKind::NoArchive)?;
        let dest_url = crate::util::url::parse(&destination.display().to_string())?;
        transport::push_to_url(&archive_path, &dest_url, cfg.verify_ssl())
    }

    pub fn cachable(&self) -> bool {
        self.digest.is_some()
    }

    pub fn source_id(&self) -> Option<String> {
        self.digest.as_ref().map(|d| d.hex.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_bucket_signer_rewrites_under_default_endpoint() {
        let u = Url::parse("s3://my-bucket/dist/a.tar.gz").unwrap();
        let signed = PublicBucketSigner.sign_get(&u).unwrap();
        assert_eq!(signed.as_str(), "https://s3.amazonaws.com/my-bucket/dist/a.tar.gz");
    }
}

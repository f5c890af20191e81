//! Digest inference, streaming hash, and constant-time comparison.
//!
//! Mirrors the way spack's `util.crypto` maps a hex digest's length back to
//! an algorithm name: callers only ever declare a hex string, and the
//! algorithm is inferred unless stated explicitly.

use crate::util::errors::{ErrorKind, Res};
use digest::Digest;
use failure::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// `sha256` is the only algorithm the core ever *requires* of a caller; the
/// others are accepted for backward compatibility with older checksums.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgo {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgo {
    /// Infer the algorithm from a hex digest's length.
    pub fn from_hex_len(len: usize) -> Option<HashAlgo> {
        match len {
            32 => Some(HashAlgo::Md5),
            40 => Some(HashAlgo::Sha1),
            56 => Some(HashAlgo::Sha224),
            64 => Some(HashAlgo::Sha256),
            96 => Some(HashAlgo::Sha384),
            128 => Some(HashAlgo::Sha512),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgo::Md5 => "md5",
            HashAlgo::Sha1 => "sha1",
            HashAlgo::Sha224 => "sha224",
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha384 => "sha384",
            HashAlgo::Sha512 => "sha512",
        }
    }

    /// All recognised attribute names for this algorithm family, as used to
    /// populate a URL fetcher's `optional_attrs`.
    pub fn all_names() -> &'static [&'static str] {
        &["md5", "sha1", "sha224", "sha256", "sha384", "sha512", "checksum"]
    }
}

/// `{algo, hex}` — a declared or inferred digest.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Digest_ {
    pub algo: HashAlgo,
    pub hex: String,
}

impl Digest_ {
    pub fn new(hex: impl Into<String>) -> Option<Digest_> {
        let hex = hex.into();
        let algo = HashAlgo::from_hex_len(hex.len())?;
        Some(Digest_ { algo, hex })
    }

    pub fn with_algo(algo: HashAlgo, hex: impl Into<String>) -> Digest_ {
        Digest_ {
            algo,
            hex: hex.into(),
        }
    }
}

/// Streams a file through the appropriate hasher and reports whether the
/// resulting hex digest matches.
pub struct Checker {
    pub digest: Digest_,
    pub sum: Option<String>,
}

impl Checker {
    pub fn new(digest: Digest_) -> Checker {
        Checker { digest, sum: None }
    }

    pub fn hash_name(&self) -> &'static str {
        self.digest.algo.name()
    }

    /// Stream-hash `path` and compare, constant-time, against the declared
    /// digest. Records the computed sum either way so callers can report it
    /// on mismatch.
    pub fn check(&mut self, path: &Path) -> Res<bool> {
        use subtle::ConstantTimeEq;
        let computed = hash_file(path, self.digest.algo)?;
        let matches: bool = computed.as_bytes().ct_eq(self.digest.hex.as_bytes()).into();
        self.sum = Some(computed);
        Ok(matches)
    }
}

pub fn hash_file(path: &Path, algo: HashAlgo) -> Res<String> {
    let file = File::open(path).context(ErrorKind::NoArchive)?;
    let mut reader = BufReader::new(file);
    let mut buf = [0u8; 64 * 1024];

    macro_rules! drive {
        ($hasher:expr) => {{
            let mut hasher = $hasher;
            loop {
                let n = reader.read(&mut buf).context(ErrorKind::NoArchive)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            hex::encode(hasher.finalize())
        }};
    }

    let hex = match algo {
        HashAlgo::Md5 => drive!(md5::Md5::new()),
        HashAlgo::Sha1 => drive!(sha1::Sha1::new()),
        HashAlgo::Sha224 => drive!(sha2::Sha224::new()),
        HashAlgo::Sha256 => drive!(sha2::Sha256::new()),
        HashAlgo::Sha384 => drive!(sha2::Sha384::new()),
        HashAlgo::Sha512 => drive!(sha2::Sha512::new()),
    };

    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn infers_algo_from_hex_len() {
        assert_eq!(HashAlgo::from_hex_len(64), Some(HashAlgo::Sha256));
        assert_eq!(HashAlgo::from_hex_len(32), Some(HashAlgo::Md5));
        assert_eq!(HashAlgo::from_hex_len(7), None);
    }

    #[test]
    fn checks_known_sha256() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let digest = Digest_::with_algo(
            HashAlgo::Sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
        );
        let mut checker = Checker::new(digest);
        assert!(checker.check(f.path()).unwrap());
    }

    #[test]
    fn rejects_wrong_digest() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let digest = Digest_::with_algo(HashAlgo::Sha256, "0".repeat(64));
        let mut checker = Checker::new(digest);
        assert!(!checker.check(f.path()).unwrap());
    }
}

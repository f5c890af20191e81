//! Archive extension detection, decompressor selection, and stream-extract.

use crate::util::errors::{ErrorKind, Res};
use failure::ResultExt;
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;

/// The archive extensions the spider recognises as terminal (not to be
/// recursed into) and that `extension()` knows how to strip.
pub const ALLOWED_ARCHIVE_TYPES: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz", ".tar", ".zip", ".gz",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Tar,
    PlainGz,
    Zip,
}

/// Detects the archive kind from a filename, preferring an explicit
/// extension override when the caller supplied one.
pub fn detect(path: &Path, extension_override: Option<&str>) -> Option<ArchiveKind> {
    let name = extension_override
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_lowercase());

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveKind::TarGz)
    } else if name.ends_with(".tar") {
        Some(ArchiveKind::Tar)
    } else if name.ends_with(".gz") {
        Some(ArchiveKind::PlainGz)
    } else if name.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else {
        None
    }
}

/// Returns the archive extension suffix stripped from `path`'s basename, or
/// `None` if it isn't a recognised archive.
pub fn extension(path: &Path) -> Option<&'static str> {
    let name = path.to_string_lossy().to_lowercase();
    ALLOWED_ARCHIVE_TYPES
        .iter()
        .find(|suf| name.ends_with(*suf))
        .copied()
}

/// Stream-extracts `archive` into `dest`, which must already exist.
pub fn expand_into(archive: &Path, dest: &Path, kind: ArchiveKind) -> Res<()> {
    let file = File::open(archive).context(ErrorKind::NoArchive)?;

    match kind {
        ArchiveKind::TarGz => {
            let gz = GzDecoder::new(file);
            let mut ar = tar::Archive::new(gz);
            ar.unpack(dest).context(ErrorKind::NoArchive)?;
        }
        ArchiveKind::Tar => {
            let mut ar = tar::Archive::new(file);
            ar.unpack(dest).context(ErrorKind::NoArchive)?;
        }
        ArchiveKind::PlainGz => {
            use std::io::{copy, Read};
            let mut gz = GzDecoder::new(file);
            let target_name = archive
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "expanded".to_string());
            let mut out = File::create(dest.join(target_name)).context(ErrorKind::NoArchive)?;
            let mut buf = Vec::new();
            gz.read_to_end(&mut buf).context(ErrorKind::NoArchive)?;
            copy(&mut buf.as_slice(), &mut out).context(ErrorKind::NoArchive)?;
        }
        ArchiveKind::Zip => {
            // Zip support is intentionally a thin veneer: the formats this
            // core actually needs to round-trip (source tarballs, VCS
            // archives) never produce one, but package authors occasionally
            // publish release archives this way.
            let mut zip = zip_min::ZipReader::open(archive).context(ErrorKind::NoArchive)?;
            zip.extract_all(dest).context(ErrorKind::NoArchive)?;
        }
    }

    Ok(())
}

/// Creates a gzip tarball of `src_dir` at `dest`, excluding any top-level
/// entries named in `exclude` (VCS metadata directories).
pub fn tar_gz_dir(src_dir: &Path, dest: &Path, root_name: &str, exclude: &[&str]) -> Res<()> {
    let file = std::fs::File::create(dest).context(ErrorKind::NoArchive)?;
    let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(enc);

    for entry in walkdir::WalkDir::new(src_dir).min_depth(1).max_depth(1) {
        let entry = entry.context(ErrorKind::NoArchive)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if exclude.contains(&name.as_str()) {
            continue;
        }
        let rel = Path::new(root_name).join(&name);
        if entry.file_type().is_dir() {
            builder
                .append_dir_all(&rel, entry.path())
                .context(ErrorKind::NoArchive)?;
        } else {
            let mut f = File::open(entry.path()).context(ErrorKind::NoArchive)?;
            builder
                .append_file(&rel, &mut f)
                .context(ErrorKind::NoArchive)?;
        }
    }

    builder.finish().context(ErrorKind::NoArchive)?;
    Ok(())
}

/// A minimal zip reader so `expand_into` doesn't need a heavyweight
/// dependency for the one archive kind this core rarely sees.
mod zip_min {
    use crate::util::errors::{ErrorKind, Res};
    use failure::ResultExt;
    use std::io::Read;
    use std::path::Path;

    pub struct ZipReader {
        inner: zip::ZipArchive<std::fs::File>,
    }

    impl ZipReader {
        pub fn open(path: &Path) -> Res<ZipReader> {
            let file = std::fs::File::open(path).context(ErrorKind::NoArchive)?;
            let inner = zip::ZipArchive::new(file).context(ErrorKind::NoArchive)?;
            Ok(ZipReader { inner })
        }

        pub fn extract_all(&mut self, dest: &Path) -> Res<()> {
            for i in 0..self.inner.len() {
                let mut entry = self.inner.by_index(i).context(ErrorKind::NoArchive)?;
                let out_path = match entry.enclosed_name() {
                    Some(p) => dest.join(p),
                    None => continue,
                };
                if entry.is_dir() {
                    std::fs::create_dir_all(&out_path).context(ErrorKind::NoArchive)?;
                } else {
                    if let Some(parent) = out_path.parent() {
                        std::fs::create_dir_all(parent).context(ErrorKind::NoArchive)?;
                    }
                    let mut out = std::fs::File::create(&out_path).context(ErrorKind::NoArchive)?;
                    let mut buf = Vec::new();
                    entry.read_to_end(&mut buf).context(ErrorKind::NoArchive)?;
                    std::io::Write::write_all(&mut out, &buf).context(ErrorKind::NoArchive)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_tar_gz() {
        assert_eq!(
            detect(Path::new("foo-1.0.tar.gz"), None),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(detect(Path::new("foo-1.0.tgz"), None), Some(ArchiveKind::TarGz));
    }

    #[test]
    fn detects_nothing_for_unknown_extension() {
        assert_eq!(detect(Path::new("foo-1.0.exe"), None), None);
    }

    #[test]
    fn extension_override_wins() {
        assert_eq!(detect(Path::new("weird-name"), Some(".tar.gz")), Some(ArchiveKind::TarGz));
    }
}
